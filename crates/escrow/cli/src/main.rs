//! Escrow CLI - lock credits against applications and resolve them
//!
//! Every invocation loads the state snapshot (or the configured genesis when
//! none exists yet), runs one operation and saves the snapshot again if the
//! operation changed anything.

use clap::{Parser, Subcommand};
use escrow_service::{init_tracing, EscrowConfig, EscrowService};
use tracing::debug;

mod commands;
mod output;

use commands::application::{self, ApplicationCommands, ResolveArgs, SubmitArgs};
use commands::balance::{self, BalanceArgs, CreditArgs, TransferArgs};
use commands::journal::{self, JournalCommands};
use commands::resource::{self, ResourceCommands};
use output::{print_single, print_success, OutputFormat};

/// Escrow CLI application
#[derive(Parser)]
#[command(name = "escrow")]
#[command(about = "Escrow - credit locking and application escrow", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ESCROW_CONFIG")]
    config: Option<String>,

    /// State snapshot path, overriding the configured one
    #[arg(short, long, env = "ESCROW_STATE")]
    state: Option<String>,

    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Write a fresh state snapshot from the configured genesis
    Init {
        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },

    /// Manage pool resources
    Resource {
        #[command(subcommand)]
        command: ResourceCommands,
    },

    /// Mint credits to a holder
    Credit(CreditArgs),

    /// Move free credits between holders
    Transfer(TransferArgs),

    /// Show a holder's balances
    Balance(BalanceArgs),

    /// Lock credits and record a pending application
    Submit(SubmitArgs),

    /// Burn an application's locked credits and consume pool capacity
    Approve(ResolveArgs),

    /// Release an application's locked credits
    Reject(ResolveArgs),

    /// Inspect applications
    #[command(alias = "app")]
    Application {
        #[command(subcommand)]
        command: ApplicationCommands,
    },

    /// Inspect the event journal
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },

    /// Show the effective configuration
    Config,
}

impl Commands {
    fn mutates(&self) -> bool {
        match self {
            Commands::Resource { command } => command.mutates(),
            Commands::Credit(_)
            | Commands::Transfer(_)
            | Commands::Submit(_)
            | Commands::Approve(_)
            | Commands::Reject(_) => true,
            _ => false,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EscrowConfig::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.state.path = state;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Config => print_single(&config, cli.output),

        Commands::Init { force } => {
            if std::path::Path::new(&config.state.path).exists() && !force {
                anyhow::bail!(
                    "state snapshot {} already exists (use --force to overwrite)",
                    config.state.path
                );
            }
            let service = EscrowService::from_config(config)?;
            let path = service.save()?;
            print_success(&format!("Initialized {}", path.display()));
            print_single(&service.snapshot()?, cli.output)
        }

        command => {
            let mutates = command.mutates();
            let service = EscrowService::load_or_init(config)?;
            let format = cli.output;

            match command {
                Commands::Resource { command } => resource::execute(command, &service, format)?,
                Commands::Credit(args) => balance::credit(args, &service, format)?,
                Commands::Transfer(args) => balance::transfer(args, &service, format)?,
                Commands::Balance(args) => balance::balance(args, &service, format)?,
                Commands::Submit(args) => application::submit(args, &service, format)?,
                Commands::Approve(args) => application::approve(args, &service, format)?,
                Commands::Reject(args) => application::reject(args, &service, format)?,
                Commands::Application { command } => application::execute(command, &service, format)?,
                Commands::Journal { command } => journal::execute(command, &service, format)?,
                Commands::Config | Commands::Init { .. } => unreachable!("handled above"),
            }

            if mutates {
                let path = service.save()?;
                debug!(path = %path.display(), "State saved");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_parses_repeated_items() {
        let cli = Cli::try_parse_from([
            "escrow", "submit", "dev", "--grouping-key", "SOLENT", "--item", "1:400", "--item",
            "2:150",
        ])
        .unwrap();
        assert!(cli.command.mutates());
        match cli.command {
            Commands::Submit(args) => {
                assert_eq!(args.items.len(), 2);
                assert_eq!(args.items[1].amount, 150);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_read_only_commands_do_not_save() {
        let cli = Cli::try_parse_from(["escrow", "balance", "dev"]).unwrap();
        assert!(!cli.command.mutates());
        let cli = Cli::try_parse_from(["escrow", "app", "list", "--status", "pending"]).unwrap();
        assert!(!cli.command.mutates());
    }
}
