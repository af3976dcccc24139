pub mod cli;
pub mod export;
pub mod load_config;

pub use cli::{run, Cli, Commands};
