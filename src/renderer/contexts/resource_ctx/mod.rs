pub mod arena;
pub mod depth;
pub mod uniform;

pub use arena::{DrawEntry, VertexArena};
pub use depth::DepthResource;
pub use uniform::UniformResource;
