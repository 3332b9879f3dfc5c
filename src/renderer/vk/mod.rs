// This module provides thin helpers over raw Vulkan objects and operations.

pub mod buffer;
pub mod descriptor_set_layout_builder;
pub mod memory;
pub mod util;
