//! Background Tasks Module
//!
//! Recurring tasks owned by cache instances. Each task holds a single timer
//! per instance and is released by aborting its `JoinHandle` at shutdown.

mod cleanup;

pub use cleanup::spawn_sweep_task;
