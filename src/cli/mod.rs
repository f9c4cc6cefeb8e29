pub mod config_cmd;
pub mod connect;
pub mod project;
