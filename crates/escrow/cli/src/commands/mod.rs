//! CLI command implementations

pub mod application;
pub mod balance;
pub mod journal;
pub mod resource;

use escrow_types::{ApplicationId, LineItem, ResourceId};

/// Accepts `7` or `resource-7`.
pub fn parse_resource_id(s: &str) -> Result<ResourceId, String> {
    let digits = s.strip_prefix("resource-").unwrap_or(s);
    let id: u64 = digits
        .parse()
        .map_err(|_| format!("invalid resource id '{}'", s))?;
    if id == 0 {
        return Err("resource id must be positive".to_string());
    }
    Ok(ResourceId(id))
}

/// Accepts `3` or `application-3`.
pub fn parse_application_id(s: &str) -> Result<ApplicationId, String> {
    let digits = s.strip_prefix("application-").unwrap_or(s);
    digits
        .parse()
        .map(ApplicationId)
        .map_err(|_| format!("invalid application id '{}'", s))
}

/// Parses `RESOURCE:AMOUNT`, e.g. `1:400`.
pub fn parse_line_item(s: &str) -> Result<LineItem, String> {
    let (resource, amount) = s
        .split_once(':')
        .ok_or_else(|| format!("expected RESOURCE:AMOUNT, got '{}'", s))?;
    let amount: u64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount in '{}'", s))?;
    Ok(LineItem::new(parse_resource_id(resource.trim())?, amount))
}
