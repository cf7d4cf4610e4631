pub mod cli;
pub mod feed;
pub mod load_config;
pub mod publish;
pub mod transform;

pub use cli::{run, Cli, Commands};
