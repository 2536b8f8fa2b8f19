//! Utilities shared by the CLI and the library.
//!
//! - [`fs`] - Directory creation and atomic writes
//! - [`progress`] - Spinners that respect `--no-progress`

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, format_size};
pub use progress::{ProgressBar, spinner_with_message};
