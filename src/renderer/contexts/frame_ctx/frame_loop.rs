use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::contexts::frame_ctx::frame::WaitOutcome;

/// Where the current frame is in its acquire, record, submit, present cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

impl FrameState {
    /// Frames run strictly serially, so every state has exactly one successor
    pub fn next(self) -> Self {
        match self {
            FrameState::Idle => FrameState::Acquiring,
            FrameState::Acquiring => FrameState::Recording,
            FrameState::Recording => FrameState::Submitted,
            FrameState::Submitted => FrameState::Presenting,
            FrameState::Presenting => FrameState::Idle,
        }
    }
}

/// Window side of the loop: a close signal plus a way to drain pending events
pub trait EventPump {
    fn should_close(&self) -> bool;
    fn poll_events(&mut self);
}

pub trait FramePresenter {
    fn draw_frame(&mut self) -> Result<()>;
}

/// Draws frames until the pump reports close. Returns the number of frames drawn.
///
/// Frames never overlap: `draw_frame` returns only after its GPU work has completed.
pub fn run_frame_loop(
    pump: &mut impl EventPump,
    presenter: &mut impl FramePresenter,
) -> Result<u64> {
    log::info!("Frame loop started");
    let mut frames = 0;

    while !pump.should_close() {
        pump.poll_events();
        if pump.should_close() {
            break;
        }

        presenter.draw_frame()?;
        frames += 1;
    }

    log::info!("Frame loop stopped after {} frames", frames);
    Ok(frames)
}

/// Calls `wait` until it reports a signal, giving up after `attempts` timeouts
pub fn wait_with_retries(
    mut wait: impl FnMut() -> Result<WaitOutcome>,
    attempts: u32,
) -> Result<()> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match wait()? {
            WaitOutcome::Signaled => return Ok(()),
            WaitOutcome::TimedOut => log::trace!("Fence wait {}/{} timed out", attempt, attempts),
        }
    }

    Err(eyre!("Render fence still unsignaled after {} bounded waits", attempts))
}
