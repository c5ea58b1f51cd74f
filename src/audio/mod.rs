pub mod buffer;
pub mod decode;
pub mod segment;
pub mod wav;
