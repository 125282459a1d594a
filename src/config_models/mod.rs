pub mod cli_args;
pub mod data_directory;
pub mod engine_config;
