pub mod buffer;
pub mod snap;
