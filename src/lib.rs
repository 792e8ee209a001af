//! Agent Office: a router that dispatches tasks to specialist workers, each
//! with durable, searchable memory.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod router;
pub mod server;
pub mod store;
pub mod tools;
pub mod util;
pub mod workers;
