use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ifall - daily retail price refresh with email and Telegram reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "ifall", version, about)]
pub struct Args {
    /// Directory holding default.toml and the optional per-mode overrides
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler, the registration API and the subscription bot (default)
    Serve,
    /// Run one refresh cycle now and exit
    Refresh,
    /// Add a catalog item to the store with a zero starting price
    AddItem {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Variant colour code as shown on the retailer page, e.g. 353839
        #[arg(long)]
        variant: String,
    },
    /// Show the stored catalog with the last price and delta of each item
    ListItems,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
