use std::path::Path;

use serde_json::json;
use voicely_core::tenant::{tenant_record_path, write_tenant_config, TenantConfig, TenantId};

use crate::commands::CommandResult;

const COMMAND: &str = "create-tenant";

/// Writes the starter record for `raw_tenant_id` into `tenants_dir`.
/// An existing record is only replaced with `force`.
pub fn run(raw_tenant_id: &str, tenants_dir: &Path, force: bool) -> CommandResult {
    let tenant_id = match TenantId::parse(raw_tenant_id) {
        Ok(tenant_id) => tenant_id,
        Err(error) => return CommandResult::failure(COMMAND, "invalid_tenant_id", error.to_string(), 2),
    };

    let path = tenant_record_path(tenants_dir, &tenant_id);
    if path.exists() && !force {
        return CommandResult::failure(
            COMMAND,
            "tenant_exists",
            format!("`{}` already exists; pass --force to overwrite", path.display()),
            4,
        );
    }

    match write_tenant_config(tenants_dir, &tenant_id, &TenantConfig::template()) {
        Ok(path) => CommandResult::success_with_data(
            COMMAND,
            format!("tenant configuration created: {}", path.display()),
            Some(json!({
                "path": path.display().to_string(),
                "webhook_path": format!("/webhook/{tenant_id}"),
                "next_steps": [
                    format!("Edit {} with the creator's values", path.display()),
                    "Set meta_config.page_id and meta_config.page_access_token from the Meta app",
                    "Point booking_url at the creator's booking page",
                    "Customize the pricing, voice, and persona files",
                ],
            })),
        ),
        Err(error) => CommandResult::failure(COMMAND, "write_failed", error.to_string(), 5),
    }
}
