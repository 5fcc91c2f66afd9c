pub mod convert;
pub mod sample;
