use std::path::PathBuf;
use std::time::Duration;
use ash::vk;

/// Contains configuration options for the renderer like the window size, shaders, and timeouts
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub app_name: String,
    pub enable_validation: bool,

    pub vertex_shader_path: PathBuf,
    pub fragment_shader_path: PathBuf,
    pub topology: vk::PrimitiveTopology,
    pub clear_color: [f32; 4],

    /// Upper bound for each blocking wait (image acquire, fence wait)
    pub wait_timeout: Duration,
    /// Number of bounded fence waits attempted before a frame is considered lost
    pub fence_wait_retries: u32,
}

impl RenderConfig {
    pub fn wait_timeout_ns(&self) -> u64 {
        u64::try_from(self.wait_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 800,
            app_name: "vk-anim".into(),
            enable_validation: cfg!(debug_assertions),

            vertex_shader_path: PathBuf::from("shaders-built/shader.vert.spv"),
            fragment_shader_path: PathBuf::from("shaders-built/shader.frag.spv"),
            topology: vk::PrimitiveTopology::LINE_STRIP,
            clear_color: [0.1, 0.1, 0.1, 1.0],

            wait_timeout: Duration::from_millis(100),
            fence_wait_retries: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_100_ms_in_nanoseconds() {
        let config = RenderConfig::default();
        assert_eq!(config.wait_timeout_ns(), 100_000_000);
    }

    #[test]
    fn oversized_timeout_saturates() {
        let config = RenderConfig {
            wait_timeout: Duration::MAX,
            ..Default::default()
        };
        assert_eq!(config.wait_timeout_ns(), u64::MAX);
    }
}
