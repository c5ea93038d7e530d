//! Configuration loading and the context that owns one element load.

mod config;
mod context;

pub use config::{
    ConfigError, SimulationConfig, SimulationInputs, load_simulation_config,
    load_simulation_inputs,
};
pub use context::SimulationContext;
