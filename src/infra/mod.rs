pub mod config;
pub mod vapi;
