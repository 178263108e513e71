pub mod compiler;
pub mod config;
pub mod dsl;
pub mod nodes;
pub mod runtime;

pub use config::EngineConfig;
pub use runtime::engine::{Engine, TriggerOptions};
