pub mod constants;
pub mod elements;
pub mod shells;
