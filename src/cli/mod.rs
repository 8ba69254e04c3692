//! CLI layer for `meshc2`.
//!
//! Provides argument parsing (clap derive) and controller result rendering
//! for the `meshc2-agent` and `meshc2-controller` binaries.

pub mod output;
pub mod parser;

pub use parser::{AgentArgs, ControllerArgs, OutputFormat};
