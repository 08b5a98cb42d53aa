//! Application commands

use clap::{Args, Subcommand};
use escrow_registry::ApplicationFilter;
use escrow_service::EscrowService;
use escrow_types::{ApplicationId, ApplicationStatus, GroupingKey, HolderId, LineItem};

use super::{parse_application_id, parse_line_item};
use crate::output::{print_single, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct SubmitArgs {
    /// Holder whose credits are locked
    pub submitter: String,

    /// Grouping key every line item must belong to
    #[arg(short, long)]
    pub grouping_key: String,

    /// Line item as RESOURCE:AMOUNT; repeat for multi-item applications
    #[arg(short, long = "item", value_parser = parse_line_item, required = true)]
    pub items: Vec<LineItem>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[arg(value_parser = parse_application_id)]
    pub id: ApplicationId,
}

/// Read-only application subcommands
#[derive(Subcommand)]
pub enum ApplicationCommands {
    /// Show one application
    Show {
        #[arg(value_parser = parse_application_id)]
        id: ApplicationId,
    },

    /// List applications
    List {
        #[arg(long)]
        submitter: Option<String>,

        /// pending, approved or rejected
        #[arg(long)]
        status: Option<ApplicationStatus>,

        #[arg(long)]
        grouping_key: Option<String>,
    },
}

pub fn submit(args: SubmitArgs, service: &EscrowService, format: OutputFormat) -> anyhow::Result<()> {
    let application = service.submit(
        &HolderId::new(args.submitter),
        args.items,
        &GroupingKey::new(args.grouping_key),
    )?;
    print_success(&format!(
        "Submitted {} locking {} credits",
        application.id,
        application.total_amount()
    ));
    print_single(&application, format)
}

pub fn approve(args: ResolveArgs, service: &EscrowService, format: OutputFormat) -> anyhow::Result<()> {
    let application = service.approve(args.id)?;
    print_success(&format!("Approved {}", application.id));
    print_single(&application, format)
}

pub fn reject(args: ResolveArgs, service: &EscrowService, format: OutputFormat) -> anyhow::Result<()> {
    let application = service.reject(args.id)?;
    print_success(&format!("Rejected {}", application.id));
    print_single(&application, format)
}

/// Execute a read-only application command
pub fn execute(
    command: ApplicationCommands,
    service: &EscrowService,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        ApplicationCommands::Show { id } => print_single(&service.application(id)?, format),

        ApplicationCommands::List {
            submitter,
            status,
            grouping_key,
        } => {
            let filter = ApplicationFilter {
                submitter: submitter.map(HolderId::new),
                status,
                grouping_key: grouping_key.map(GroupingKey::new),
            };
            let applications = service.applications(&filter)?;
            if applications.is_empty() {
                print_warning("No matching applications");
            }
            print_single(&applications, format)
        }
    }
}
