//! CLI command tests
//!
//! Each module drives the `reelshelf` binary through one command.

mod backup;
mod init;
mod migrate;
mod settings;
mod upgrade;
