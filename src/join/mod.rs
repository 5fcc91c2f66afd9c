pub mod candidates;
pub mod resolve;
