pub mod commands;
pub mod config;
pub mod logger;
pub mod operator;
pub mod render;
