//! Structural extraction of resource metadata from Terraform source
//!
//! Caller-supplied code is parsed as HCL and the relevant `azurerm_*` blocks
//! are walked directly, so quoting or formatting differences never change
//! what gets extracted. Attributes that are not plain strings (references,
//! interpolations) are skipped and fall back to the defaults.

use hcl::{Block, Body, Expression};

use crate::errors::ServiceError;
use crate::models::deployment::ResourceSpec;

/// Extract a [`ResourceSpec`] from Terraform source text.
///
/// Missing resources or attributes fall back to the spec defaults; only a
/// syntactically unparseable document is an error.
pub fn parse_resource_spec(code: &str) -> Result<ResourceSpec, ServiceError> {
    let body: Body = hcl::from_str(code)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid Terraform code: {}", e)))?;

    let mut spec = ResourceSpec::default();

    for block in body.blocks() {
        if block.identifier() != "resource" {
            continue;
        }
        let Some(resource_type) = block.labels().first().map(|l| l.as_str()) else {
            continue;
        };

        match resource_type {
            "azurerm_resource_group" => {
                if let Some(name) = string_attribute(block, "name") {
                    spec.resource_group = name;
                }
                if let Some(location) = string_attribute(block, "location") {
                    spec.location = location;
                }
            }
            "azurerm_windows_web_app" | "azurerm_linux_web_app" => {
                if let Some(name) = string_attribute(block, "name") {
                    spec.app_service_name = name;
                }
            }
            "azurerm_service_plan" => {
                if let Some(name) = string_attribute(block, "name") {
                    spec.service_plan_name = name;
                }
            }
            _ => {}
        }
    }

    Ok(spec)
}

fn string_attribute(block: &Block, key: &str) -> Option<String> {
    block
        .body()
        .attributes()
        .find(|attr| attr.key() == key)
        .and_then(|attr| match attr.expr() {
            Expression::String(s) => Some(s.clone()),
            _ => None,
        })
}
