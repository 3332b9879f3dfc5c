pub mod frame;
pub mod frame_loop;

pub use frame::{Frame, FrameTargets, WaitOutcome};
pub use frame_loop::{run_frame_loop, wait_with_retries, EventPump, FramePresenter, FrameState};
