pub mod base;
pub mod config;
pub mod resources;
pub mod settings;
