//! Integration test utilities for the client runtime
//!
//! This crate provides in-process stand-ins for the external services:
//! a canned-response HTTP API and a minimal gateway socket, both bound
//! to ephemeral ports.

pub mod helpers;

pub use helpers::*;
