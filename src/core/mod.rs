//! Core types shared across reelshelf.
//!
//! Currently this is the error layer: [`ReelshelfError`] for typed pipeline
//! failures and [`ErrorContext`] for what the operator sees.

pub mod error;

pub use error::{ErrorContext, ReelshelfError, user_friendly_error};
