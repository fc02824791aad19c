pub mod config;
pub mod formula;
