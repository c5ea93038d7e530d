pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;
pub mod transitions;

pub use domain::{SimError, SimErrorCategory, SimResult};
