pub mod active;
pub mod blueprint;
pub mod clock;
pub mod context;
pub mod ending;
pub mod engine;
pub mod error;
pub mod events;
pub mod list;
pub mod node;
pub mod parameter;
pub mod redis_storage;
pub mod registry;
pub mod storage;
pub mod syscall;
pub mod task;
pub mod variables;
