//! Digital port loopback tester.
//!
//! Writes a fixed set of byte patterns to each output port of a device and
//! checks that they read back unchanged on the port it is wired to.

pub mod cli;
pub mod error;
pub mod pattern;
pub mod port_io;
pub mod record;
pub mod report;
pub mod runner;
