pub mod object;
pub mod vertex;
