//! Terraform generation with a resource metadata side-channel
//!
//! Generated snippets carry their [`ResourceSpec`] alongside the rendered
//! text, so downstream deployment paths never have to re-derive resource
//! names from code they produced themselves.

use crate::models::deployment::{CodeFormat, ResourceSpec};

/// A rendered snippet together with the metadata it was rendered from
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub code: String,
    pub code_type: CodeFormat,
    pub spec: ResourceSpec,
}

/// Terraform for an Azure Linux web app behind an App Service plan
pub fn web_app() -> GeneratedCode {
    let spec = ResourceSpec {
        resource_group: "rg-instanti8-webapp".to_string(),
        location: "East US".to_string(),
        app_service_name: "app-instanti8".to_string(),
        service_plan_name: "plan-instanti8".to_string(),
    };

    let code = format!(
        r#"provider "azurerm" {{
  features {{}}
}}

resource "azurerm_resource_group" "main" {{
  name     = "{rg}"
  location = "{location}"
}}

resource "azurerm_service_plan" "main" {{
  name                = "{plan}"
  resource_group_name = azurerm_resource_group.main.name
  location            = azurerm_resource_group.main.location
  sku_name            = "P1v2"
  os_type             = "Linux"
}}

resource "azurerm_linux_web_app" "main" {{
  name                = "{app}"
  resource_group_name = azurerm_resource_group.main.name
  location            = azurerm_service_plan.main.location
  service_plan_id     = azurerm_service_plan.main.id

  site_config {{
    always_on = true
    application_stack {{
      node_version = "18-lts"
    }}
  }}
}}

output "app_url" {{
  value = azurerm_linux_web_app.main.default_hostname
}}
"#,
        rg = spec.resource_group,
        location = spec.location,
        plan = spec.service_plan_name,
        app = spec.app_service_name,
    );

    GeneratedCode {
        code,
        code_type: CodeFormat::Terraform,
        spec,
    }
}

/// Terraform for a public Azure container group running a single image
pub fn container_group(image: &str) -> GeneratedCode {
    let spec = ResourceSpec {
        resource_group: "rg-instanti8-container".to_string(),
        location: "East US".to_string(),
        app_service_name: "ci-instanti8".to_string(),
        service_plan_name: "plan-instanti8".to_string(),
    };

    let code = format!(
        r#"provider "azurerm" {{
  features {{}}
}}

resource "azurerm_resource_group" "main" {{
  name     = "{rg}"
  location = "{location}"
}}

resource "azurerm_container_group" "main" {{
  name                = "{name}"
  location            = azurerm_resource_group.main.location
  resource_group_name = azurerm_resource_group.main.name
  ip_address_type     = "Public"
  os_type             = "Linux"

  container {{
    name   = "app"
    image  = "{image}"
    cpu    = "0.5"
    memory = "1.5"

    ports {{
      port     = 80
      protocol = "TCP"
    }}
  }}
}}

output "container_ip" {{
  value = azurerm_container_group.main.ip_address
}}
"#,
        rg = spec.resource_group,
        location = spec.location,
        name = spec.app_service_name,
        image = image,
    );

    GeneratedCode {
        code,
        code_type: CodeFormat::Terraform,
        spec,
    }
}
