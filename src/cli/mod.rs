pub mod commands;
pub mod display;
pub mod initializer;

pub use commands::{CliArgs, Commands};
