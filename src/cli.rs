//! CLI interface for farmtrace.
//!
//! Each subcommand is non-interactive: arguments in, one line (or one JSON
//! document) out on stdout. Diagnostics and logs go to stderr.
//!
//! Commands split into two groups:
//!
//! - `harvest|process|ship|receive`: lifecycle commands, need an acting identity.
//! - `show|history|list|verify`: read-only queries, no identity needed.

mod format;
mod item;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::identity::resolve_identity;
use crate::lifecycle::Lifecycle;
use crate::model::{Address, ItemId};
use crate::storage::Storage;

/// farmtrace: custody and processing ledger for physical goods.
#[derive(Debug, Parser)]
#[command(name = "farmtrace", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Ledger database file. Overrides `database` in the config.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting address for lifecycle commands.
    #[arg(long = "as", global = true)]
    pub identity: Option<String>,

    /// Log filter (e.g. `info`, `farmtrace=debug`). Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: farm to table
  1. farmtrace --as 0xfa… harvest 'Organic Coffee Beans'
     → prints the item id (e.g. 1)
  2. farmtrace --as 0xfa… process 1
  3. farmtrace --as 0xfa… ship 1 0x0c…
  4. farmtrace --as 0x0c… receive 1

Inspect:
  farmtrace show 1
  farmtrace history 1 --json
  farmtrace verify 1";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a newly harvested item. Prints its id.
    Harvest {
        /// Free-text label, fixed for the life of the item.
        name: String,
    },

    /// Mark a harvested item as processed.
    Process { id: ItemId },

    /// Hand a processed item to a new owner and mark it shipped.
    Ship {
        id: ItemId,

        /// Recipient address; becomes the item's owner.
        recipient: String,
    },

    /// Mark a shipped item as received.
    Receive { id: ItemId },

    /// Show an item's current state.
    Show {
        id: ItemId,

        #[arg(long)]
        json: bool,
    },

    /// Show an item's tracking records, oldest first.
    History {
        id: ItemId,

        #[arg(long)]
        json: bool,
    },

    /// List all items.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Check an item's record chain for tampering.
    Verify { id: ItemId },
}

/// Run the parsed CLI against an open ledger, returning an error message on failure.
pub fn run(cli: Cli, config: &Config, storage: &Storage) -> Result<(), String> {
    let ledger = Lifecycle::new(storage);
    let actor = || resolve_identity(cli.identity.as_deref(), config);

    match cli.command {
        Command::Harvest { name } => item::cmd_harvest(&ledger, actor()?, &name),
        Command::Process { id } => item::cmd_process(&ledger, actor()?, id),
        Command::Ship { id, recipient } => {
            let recipient = parse_recipient(&recipient)?;
            item::cmd_ship(&ledger, actor()?, id, recipient)
        }
        Command::Receive { id } => item::cmd_receive(&ledger, actor()?, id),
        Command::Show { id, json } => query::cmd_show(&ledger, id, json),
        Command::History { id, json } => query::cmd_history(&ledger, id, json),
        Command::List { json } => query::cmd_list(&ledger, json),
        Command::Verify { id } => query::cmd_verify(&ledger, id),
    }
}

/// Parse a recipient address, reporting malformed input the same way the ledger does.
fn parse_recipient(s: &str) -> Result<Address, String> {
    s.parse()
        .map_err(|e| format!("invalid input: recipient {s}: {e}"))
}
