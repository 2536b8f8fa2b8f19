//! Integration test suite for reelshelf
//!
//! End-to-end tests of the update pipeline through the library API and of
//! the `reelshelf` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: Uploaded and XML-described releases applied to a tree
//! - **github**: Release discovery and download against a mock API
//! - **commands**: The `reelshelf` binary, one module per command

mod common;

mod commands;
mod github;
mod pipeline;
