//! Credit, transfer and balance commands

use clap::Args;
use escrow_service::EscrowService;
use escrow_types::{HolderId, ResourceId};
use serde::Serialize;

use super::parse_resource_id;
use crate::output::{print_single, print_success, OutputFormat};

#[derive(Args)]
pub struct CreditArgs {
    #[arg(value_parser = parse_resource_id)]
    pub resource: ResourceId,
    pub holder: String,
    pub amount: u64,
}

#[derive(Args)]
pub struct TransferArgs {
    #[arg(value_parser = parse_resource_id)]
    pub resource: ResourceId,
    pub from: String,
    pub to: String,
    pub amount: u64,
}

#[derive(Args)]
pub struct BalanceArgs {
    pub holder: String,

    /// Limit to one resource; otherwise every non-zero balance is listed
    #[arg(short, long, value_parser = parse_resource_id)]
    pub resource: Option<ResourceId>,
}

pub fn credit(args: CreditArgs, service: &EscrowService, format: OutputFormat) -> anyhow::Result<()> {
    let view = service.credit(args.resource, &HolderId::new(args.holder), args.amount)?;
    print_success(&format!("Credited {} of {} to {}", args.amount, view.resource, view.holder));
    print_single(&view, format)
}

pub fn transfer(
    args: TransferArgs,
    service: &EscrowService,
    format: OutputFormat,
) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Transfer<T> {
        from: T,
        to: T,
    }

    let (from, to) = service.transfer(
        args.resource,
        &HolderId::new(args.from),
        &HolderId::new(args.to),
        args.amount,
    )?;
    print_success(&format!(
        "Transferred {} of {} from {} to {}",
        args.amount, from.resource, from.holder, to.holder
    ));
    print_single(&Transfer { from, to }, format)
}

pub fn balance(args: BalanceArgs, service: &EscrowService, format: OutputFormat) -> anyhow::Result<()> {
    let holder = HolderId::new(args.holder);
    match args.resource {
        Some(resource) => print_single(&service.balance(resource, &holder)?, format),
        None => print_single(&service.balances_of(&holder)?, format),
    }
}
