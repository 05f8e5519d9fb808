//! Hirschberg–Sinclair leader election on a simulated bidirectional ring.
//!
//! Every process runs as its own tokio task and talks to its two ring
//! neighbours only through in-process FIFO links. The process with the
//! largest identifier eventually sees its probes return from both sides at a
//! radius covering the whole ring, declares itself leader and raises the
//! shared termination signal.

pub mod abstractions;
pub mod algorithms;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identifiers;
