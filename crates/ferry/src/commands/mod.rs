//! Command handlers: bridge CLI args -> engine runs -> output formatting.

pub mod config_cmd;
pub mod export;
pub mod restore;
pub mod util;
