//! `reelshelf init`: first-run setup of an installation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::installer::{InitOptions, Installer};

#[derive(Args, Debug)]
pub struct InitCommand {
    /// Installation root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Settings database, relative to the root unless absolute
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Version the tree currently holds
    #[arg(long, value_name = "VERSION")]
    version: Option<String>,
}

impl InitCommand {
    pub async fn execute(self) -> Result<()> {
        let root = self.root.unwrap_or_else(|| PathBuf::from("."));
        let options = InitOptions {
            root,
            database: self.database,
            version: self.version,
        };

        let report = Installer::init(options).await?;

        println!("{}", "Installation initialized".green());
        println!("  Config:   {}", report.config_path.display());
        println!("  Database: {}", report.database_path.display());
        println!("  Version:  {}", report.version);
        Ok(())
    }
}
