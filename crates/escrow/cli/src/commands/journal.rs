//! Journal commands

use clap::Subcommand;
use escrow_service::EscrowService;
use serde::Serialize;

use crate::output::{print_single, print_success, OutputFormat};

/// Journal subcommands
#[derive(Subcommand)]
pub enum JournalCommands {
    /// Recompute the hash chain
    Verify,

    /// Print journal entries
    Show {
        /// Only the last N entries
        #[arg(short, long)]
        tail: Option<usize>,
    },
}

#[derive(Serialize)]
struct Verification {
    entries: usize,
    head_hash: Option<String>,
    valid: bool,
}

pub fn execute(
    command: JournalCommands,
    service: &EscrowService,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        JournalCommands::Verify => {
            let journal = service.journal();
            let report = Verification {
                entries: journal.len()?,
                head_hash: journal.head_hash()?,
                valid: service.verify_journal()?,
            };
            print_single(&report, format)?;
            if !report.valid {
                anyhow::bail!("journal hash chain is broken");
            }
            print_success("Journal chain verified");
            Ok(())
        }

        JournalCommands::Show { tail } => {
            let entries = service.journal_entries()?;
            let skip = tail.map_or(0, |n| entries.len().saturating_sub(n));
            print_single(&entries[skip..], format)
        }
    }
}
