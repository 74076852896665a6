//! Integration test suite for tfroot
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: root module loading through the public API with a fake executor
//! - **cli**: the `tfroot` binary against a scripted terraform stand-in (unix only)

mod cli;
mod pipeline;
