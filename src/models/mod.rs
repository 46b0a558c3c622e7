//! Types exposed to the adapter

pub mod config;
pub mod event_bridge;
pub mod events;
pub mod state_updater;
