pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod ports;
pub mod services;
