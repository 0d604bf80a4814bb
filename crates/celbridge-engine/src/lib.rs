//! Celbridge Engine - Serialized command execution
//!
//! Every state-mutating operation passes through one execution loop, which
//! synchronizes the workspace before each operation, runs operations in
//! strict FIFO order and publishes lifecycle messages.
//!
//! [`CommandService`] is the entry point and offers three submission modes:
//! fire-and-forget [`CommandService::enqueue`], direct
//! [`CommandService::execute_immediate`] and
//! [`CommandService::execute_and_wait`].

pub mod config;
mod execution_loop;
pub mod flag_processor;
pub mod service;
pub mod synchronizer;

pub use config::EngineConfig;
pub use flag_processor::FlagProcessor;
pub use service::CommandService;
pub use synchronizer::WorkspaceSynchronizer;
