//! CLI subcommand implementations.

pub mod deploy;
pub mod generate;
pub mod objects;
pub mod randomize;
pub mod validate;
