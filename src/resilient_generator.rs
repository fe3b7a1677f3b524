#[path = "resilient_generator/config.rs"]
mod config;

#[path = "resilient_generator/wrapper.rs"]
mod wrapper;

pub use config::ResilienceConfig;
pub use wrapper::ResilientGenerator;
