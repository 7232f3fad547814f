//! Byte-wide digital port abstraction used by the loopback tester.
//!
//! A backend exposes ports of 8 lines that can be claimed as a single
//! output or input channel. [`task::PortTask`] scopes a claim so the port
//! is released on every exit path.

pub mod config;
pub mod sim;
pub mod task;
pub mod traits;
