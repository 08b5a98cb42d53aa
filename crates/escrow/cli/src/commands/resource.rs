//! Resource pool commands

use clap::Subcommand;
use escrow_service::EscrowService;
use escrow_types::{GroupingKey, ResourceId};

use super::parse_resource_id;
use crate::output::{print_single, print_success, OutputFormat};

/// Resource subcommands
#[derive(Subcommand)]
pub enum ResourceCommands {
    /// Register a resource with its full capacity remaining
    Register {
        #[arg(value_parser = parse_resource_id)]
        id: ResourceId,

        /// Grouping key, e.g. a region
        #[arg(short, long)]
        grouping_key: String,

        /// Initial capacity
        #[arg(short, long)]
        capacity: u64,
    },

    /// Show one resource
    Show {
        #[arg(value_parser = parse_resource_id)]
        id: ResourceId,
    },

    /// List resources
    List {
        /// Only resources under this grouping key
        #[arg(short, long)]
        grouping_key: Option<String>,
    },
}

impl ResourceCommands {
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Register { .. })
    }
}

/// Execute a resource command
pub fn execute(
    command: ResourceCommands,
    service: &EscrowService,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        ResourceCommands::Register {
            id,
            grouping_key,
            capacity,
        } => {
            let resource = service.register_resource(id, GroupingKey::new(grouping_key), capacity)?;
            print_success(&format!("Registered {}", resource.id));
            print_single(&resource, format)
        }

        ResourceCommands::Show { id } => print_single(&service.resource(id)?, format),

        ResourceCommands::List { grouping_key } => {
            let key = grouping_key.map(GroupingKey::new);
            print_single(&service.resources(key.as_ref())?, format)
        }
    }
}
