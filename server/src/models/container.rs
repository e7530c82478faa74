//! Container resource models and ARM wire types
//!
//! The ARM structs mirror the Microsoft.ContainerInstance JSON shapes; every
//! response is normalized into [`ContainerResource`] through the explicit
//! mapping functions here rather than ad hoc per call site.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Description of one container group to create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub resource_group: String,
    pub location: String,
    pub cpu: f64,
    /// Memory in GB
    pub memory: f64,
    pub ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Read model for a container group, normalized from ARM responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResource {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub resource_group: String,
    pub location: String,
    pub cpu: f64,
    pub memory: f64,
    pub ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

// --- ARM wire types (Microsoft.ContainerInstance, api-version 2023-05-01) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub properties: ContainerGroupProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroupProperties {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_view: Option<GroupInstanceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub properties: ContainerProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    #[serde(default)]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ContainerPort>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<Vec<EnvironmentVariable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerPort {
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub requests: ResourceRequests,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequests {
    pub cpu: f64,
    #[serde(rename = "memoryInGB")]
    pub memory_in_gb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInstanceView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub events: Vec<InstanceEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerGroupList {
    #[serde(default)]
    pub value: Vec<ContainerGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerLogs {
    #[serde(default)]
    pub content: String,
}

impl ContainerGroup {
    /// Build the PUT body for creating a container group from a spec
    pub fn from_spec(spec: &ContainerSpec) -> Self {
        let ports: Vec<ContainerPort> = spec
            .ports
            .iter()
            .map(|&port| ContainerPort {
                port,
                protocol: Some("TCP".to_string()),
            })
            .collect();

        let environment_variables = spec.environment_variables.as_ref().map(|vars| {
            vars.iter()
                .map(|(name, value)| EnvironmentVariable {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect()
        });

        let command = spec.command.as_ref().filter(|c| !c.is_empty()).cloned();

        Self {
            id: None,
            name: Some(spec.name.clone()),
            location: Some(spec.location.clone()),
            properties: ContainerGroupProperties {
                containers: vec![Container {
                    name: spec.name.clone(),
                    properties: ContainerProperties {
                        image: spec.image.clone(),
                        ports: Some(ports.clone()),
                        resources: Some(ResourceRequirements {
                            requests: ResourceRequests {
                                cpu: spec.cpu,
                                memory_in_gb: spec.memory,
                            },
                        }),
                        environment_variables,
                        command,
                    },
                }],
                os_type: Some("Linux".to_string()),
                restart_policy: Some("Always".to_string()),
                ip_address: Some(IpAddress {
                    address_type: "Public".to_string(),
                    ports,
                    ip: None,
                }),
                provisioning_state: None,
                instance_view: None,
            },
        }
    }
}

/// Extract the resource group segment from an ARM resource id
/// (`/subscriptions/<sub>/resourceGroups/<rg>/...`)
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/').skip_while(|s| *s != "resourceGroups");
    segments.next()?;
    segments.next().map(|s| s.to_string())
}

/// Normalize an ARM container group into the read model
pub fn map_container_group(group: &ContainerGroup, resource_group: Option<&str>) -> ContainerResource {
    let first = group.properties.containers.first();

    let resource_group = resource_group
        .map(|s| s.to_string())
        .or_else(|| group.id.as_deref().and_then(resource_group_from_id))
        .unwrap_or_else(|| "unknown".to_string());

    let created_at = group
        .properties
        .instance_view
        .as_ref()
        .and_then(|view| view.events.first())
        .and_then(|event| event.first_timestamp.clone())
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    ContainerResource {
        id: group.name.clone().unwrap_or_default(),
        name: group.name.clone().unwrap_or_default(),
        image: first
            .map(|c| c.properties.image.clone())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        status: group
            .properties
            .instance_view
            .as_ref()
            .and_then(|view| view.state.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        resource_group,
        location: group.location.clone().unwrap_or_default(),
        cpu: first
            .and_then(|c| c.properties.resources.as_ref())
            .map(|r| r.requests.cpu)
            .unwrap_or(0.0),
        memory: first
            .and_then(|c| c.properties.resources.as_ref())
            .map(|r| r.requests.memory_in_gb)
            .unwrap_or(0.0),
        ports: first
            .and_then(|c| c.properties.ports.as_ref())
            .map(|ports| ports.iter().map(|p| p.port).collect())
            .unwrap_or_default(),
        public_ip: group
            .properties
            .ip_address
            .as_ref()
            .and_then(|addr| addr.ip.clone()),
        created_at,
        provisioning_state: group.properties.provisioning_state.clone(),
        logs: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_group_from_id() {
        let id = "/subscriptions/abc/resourceGroups/my-rg/providers/Microsoft.ContainerInstance/containerGroups/web";
        assert_eq!(resource_group_from_id(id), Some("my-rg".to_string()));
        assert_eq!(resource_group_from_id("/subscriptions/abc"), None);
    }

    #[test]
    fn test_map_container_group_defaults() {
        let group = ContainerGroup {
            id: Some("/subscriptions/s/resourceGroups/rg-a/providers/x/y/web".to_string()),
            name: Some("web".to_string()),
            location: Some("eastus".to_string()),
            properties: ContainerGroupProperties::default(),
        };

        let resource = map_container_group(&group, None);
        assert_eq!(resource.name, "web");
        assert_eq!(resource.image, "unknown");
        assert_eq!(resource.status, "unknown");
        assert_eq!(resource.resource_group, "rg-a");
        assert_eq!(resource.cpu, 0.0);
        assert!(resource.ports.is_empty());
    }

    #[test]
    fn test_from_spec_shapes_put_body() {
        let spec = ContainerSpec {
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            resource_group: "rg-a".to_string(),
            location: "eastus".to_string(),
            cpu: 1.0,
            memory: 1.5,
            ports: vec![80, 443],
            environment_variables: None,
            command: Some(vec![]),
        };

        let group = ContainerGroup::from_spec(&spec);
        assert_eq!(group.properties.containers.len(), 1);
        // An empty command list is dropped, not serialized
        assert!(group.properties.containers[0].properties.command.is_none());
        let ip = group.properties.ip_address.as_ref().unwrap();
        assert_eq!(ip.ports.len(), 2);
        assert_eq!(ip.address_type, "Public");
    }
}
