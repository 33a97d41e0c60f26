pub mod config;
pub mod error;
pub mod health;
pub mod indicators;
pub mod logging;
pub mod market_data;
pub mod notifications;
pub mod orchestrator;
pub mod persistence;
pub mod state_machine;
pub mod strategy;
pub mod types;
