// src/serial/mod.rs
mod queue;

pub use queue::{TaskError, TaskHandle, TaskSerializer};
