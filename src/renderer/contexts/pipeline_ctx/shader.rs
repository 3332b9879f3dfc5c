use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

/// Vertex and fragment modules for one pipeline. They are only needed while the pipeline is
/// being created, so the builder drops this right after.
pub struct GraphicsShader {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: Arc<ash::Device>,
}

impl GraphicsShader {
    pub fn new(
        vertex_path: &Path,
        fragment_path: &Path,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let vert_mod = create_shader_module(vertex_path, &device)?;
        let frag_mod = match create_shader_module(fragment_path, &device) {
            Ok(module) => module,
            Err(err) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(err);
            }
        };

        Ok(Self { vert_mod, frag_mod, device })
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

/// Reads a SPIR-V binary as 32-bit words
pub fn load_spirv(filepath: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(filepath)
        .wrap_err_with(|| format!("Failed to read shader {}", filepath.display()))?;

    if bytes.is_empty() {
        return Err(eyre!("Shader {} is empty", filepath.display()));
    }
    if bytes.len() % 4 != 0 {
        return Err(eyre!(
            "Shader {} is {} bytes, not a whole number of 4-byte words",
            filepath.display(),
            bytes.len(),
        ));
    }

    let words = ash::util::read_spv(&mut Cursor::new(&bytes))
        .wrap_err_with(|| format!("Failed to decode shader {}", filepath.display()))?;
    Ok(words)
}

fn create_shader_module(filepath: &Path, device: &ash::Device) -> Result<vk::ShaderModule> {
    let code = load_spirv(filepath)?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default()
        .code(&code);

    let shader_module = unsafe {
        device.create_shader_module(&shader_module_info, None)?
    };
    log::debug!("Loaded shader module {} ({} words)", filepath.display(), code.len());

    Ok(shader_module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("vkanim-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn whole_words_are_loaded() {
        let words: [u32; 3] = [0x0723_0203, 0x0001_0000, 42];
        let path = fixture("whole.spv", bytemuck::cast_slice(&words));

        let loaded = load_spirv(&path).unwrap();
        assert_eq!(loaded, words);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn partial_word_is_rejected() {
        let path = fixture("partial.spv", &[0x03, 0x02, 0x23, 0x07, 0x00, 0x01]);

        let err = load_spirv(&path).unwrap_err();
        assert!(err.to_string().contains("4-byte words"));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = fixture("empty.spv", &[]);
        assert!(load_spirv(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_rejected() {
        let path = std::env::temp_dir().join("vkanim-does-not-exist.spv");
        assert!(load_spirv(&path).is_err());
    }
}
