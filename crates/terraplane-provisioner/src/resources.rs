// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource extraction from terraform state and plan output.
//!
//! Applied sessions read the state file terraform wrote; dry runs read the
//! `terraform show -json` rendering of the saved plan. Both paths produce
//! the same protocol [`Resource`] list. Resources whose type ends in
//! `_agent` are lifted out as workspace agents and attached to the
//! resources that depend on them; an agent with no dependency edge is
//! attached to every remaining resource.

use serde::Deserialize;
use serde_json::Value;
use terraplane_protocol::messages::{Agent, Resource, agent};

use crate::error::Result;

const AGENT_TYPE_SUFFIX: &str = "_agent";

#[derive(Deserialize)]
struct StateFile {
    #[serde(default)]
    resources: Vec<StateResource>,
}

#[derive(Deserialize)]
struct StateResource {
    #[serde(default)]
    mode: String,
    #[serde(rename = "type")]
    type_: String,
    name: String,
    #[serde(default)]
    instances: Vec<StateInstance>,
}

#[derive(Deserialize, Default)]
struct StateInstance {
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Deserialize)]
struct PlanFile {
    #[serde(default)]
    planned_values: PlannedValues,
}

#[derive(Deserialize, Default)]
struct PlannedValues {
    #[serde(default)]
    root_module: PlanModule,
}

#[derive(Deserialize, Default)]
struct PlanModule {
    #[serde(default)]
    resources: Vec<PlanResource>,
    #[serde(default)]
    child_modules: Vec<PlanModule>,
}

#[derive(Deserialize)]
struct PlanResource {
    #[serde(default)]
    mode: String,
    #[serde(rename = "type")]
    type_: String,
    name: String,
    #[serde(default)]
    values: serde_json::Map<String, Value>,
}

/// Intermediate resource form shared by the state and plan paths.
struct RawResource {
    type_: String,
    name: String,
    attributes: serde_json::Map<String, Value>,
    depends_on: Vec<String>,
}

impl RawResource {
    fn is_agent(&self) -> bool {
        self.type_.ends_with(AGENT_TYPE_SUFFIX)
    }

    fn address(&self) -> String {
        format!("{}.{}", self.type_, self.name)
    }

    fn string_attribute(&self, key: &str) -> String {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn into_agent(self) -> Agent {
        let token = self.string_attribute("token");
        Agent {
            id: self.string_attribute("id"),
            name: self.name,
            auth: if token.is_empty() {
                None
            } else {
                Some(agent::Auth::Token(token))
            },
        }
    }
}

/// Extract resources from a terraform state file.
///
/// An empty blob yields an empty resource list; a workspace that was never
/// applied has no state to read.
pub fn extract_from_state(state: &[u8]) -> Result<Vec<Resource>> {
    if state.is_empty() {
        return Ok(Vec::new());
    }
    let file: StateFile = serde_json::from_slice(state)?;
    let raw = file
        .resources
        .into_iter()
        .filter(|r| r.mode == "managed")
        .map(|r| {
            let instance = r.instances.into_iter().next().unwrap_or_default();
            RawResource {
                type_: r.type_,
                name: r.name,
                attributes: instance.attributes,
                depends_on: instance.depends_on,
            }
        })
        .collect();
    Ok(associate(raw))
}

/// Extract planned resources from `terraform show -json` output.
pub fn extract_from_plan(show_output: &str) -> Result<Vec<Resource>> {
    let file: PlanFile = serde_json::from_str(show_output)?;
    let mut flat = Vec::new();
    flatten_module(file.planned_values.root_module, &mut flat);
    let raw = flat
        .into_iter()
        .filter(|r| r.mode == "managed")
        .map(|r| RawResource {
            type_: r.type_,
            name: r.name,
            attributes: r.values,
            // Planned values carry no dependency graph.
            depends_on: Vec::new(),
        })
        .collect();
    Ok(associate(raw))
}

fn flatten_module(module: PlanModule, out: &mut Vec<PlanResource>) {
    out.extend(module.resources);
    for child in module.child_modules {
        flatten_module(child, out);
    }
}

/// Split raw resources into agents and resources, then attach each agent to
/// the resources that declared a dependency on it, or to every resource
/// when it declared none.
fn associate(raw: Vec<RawResource>) -> Vec<Resource> {
    let (agents, resources): (Vec<_>, Vec<_>) = raw.into_iter().partition(RawResource::is_agent);

    let mut out: Vec<Resource> = resources
        .into_iter()
        .map(|r| Resource {
            name: r.name.clone(),
            r#type: r.type_.clone(),
            agents: Vec::new(),
        })
        .collect();

    for agent_resource in agents {
        let targets: Vec<String> = agent_resource.depends_on.clone();
        let agent = agent_resource.into_agent();
        let mut attached = false;
        if !targets.is_empty() {
            for resource in out.iter_mut() {
                if targets
                    .iter()
                    .any(|t| t == &format!("{}.{}", resource.r#type, resource.name))
                {
                    resource.agents.push(agent.clone());
                    attached = true;
                }
            }
        }
        if !attached {
            for resource in out.iter_mut() {
                resource.agents.push(agent.clone());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_has_no_resources() {
        assert!(extract_from_state(b"").unwrap().is_empty());
    }

    #[test]
    fn test_state_skips_data_resources() {
        let state = r#"{
            "resources": [
                {"mode": "data", "type": "null_data_source", "name": "lookup", "instances": []},
                {"mode": "managed", "type": "null_resource", "name": "A", "instances": [{"attributes": {}}]}
            ]
        }"#;
        let resources = extract_from_state(state.as_bytes()).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "A");
        assert_eq!(resources[0].r#type, "null_resource");
    }

    #[test]
    fn test_state_agent_attaches_via_depends_on() {
        let state = r#"{
            "resources": [
                {"mode": "managed", "type": "null_resource", "name": "A", "instances": [{"attributes": {}}]},
                {"mode": "managed", "type": "null_resource", "name": "B", "instances": [{"attributes": {}}]},
                {"mode": "managed", "type": "fake_agent", "name": "dev", "instances": [
                    {"attributes": {"id": "agent-id", "token": "agent-token"},
                     "depends_on": ["null_resource.A"]}
                ]}
            ]
        }"#;
        let resources = extract_from_state(state.as_bytes()).unwrap();
        assert_eq!(resources.len(), 2);

        let a = resources.iter().find(|r| r.name == "A").unwrap();
        assert_eq!(a.agents.len(), 1);
        assert_eq!(a.agents[0].id, "agent-id");
        assert_eq!(a.agents[0].name, "dev");
        match a.agents[0].auth.as_ref().unwrap() {
            agent::Auth::Token(token) => assert_eq!(token, "agent-token"),
        }

        let b = resources.iter().find(|r| r.name == "B").unwrap();
        assert!(b.agents.is_empty());
    }

    #[test]
    fn test_state_agent_without_edges_attaches_everywhere() {
        let state = r#"{
            "resources": [
                {"mode": "managed", "type": "null_resource", "name": "A", "instances": [{"attributes": {}}]},
                {"mode": "managed", "type": "null_resource", "name": "B", "instances": [{"attributes": {}}]},
                {"mode": "managed", "type": "fake_agent", "name": "dev", "instances": [
                    {"attributes": {"id": "agent-id"}}
                ]}
            ]
        }"#;
        let resources = extract_from_state(state.as_bytes()).unwrap();
        assert!(resources.iter().all(|r| r.agents.len() == 1));
        // No token attribute, no auth.
        assert!(resources[0].agents[0].auth.is_none());
    }

    #[test]
    fn test_plan_resources_including_child_modules() {
        let plan = r#"{
            "planned_values": {
                "root_module": {
                    "resources": [
                        {"mode": "managed", "type": "null_resource", "name": "A", "values": {}}
                    ],
                    "child_modules": [
                        {"resources": [
                            {"mode": "managed", "type": "null_resource", "name": "nested", "values": {}}
                        ]}
                    ]
                }
            }
        }"#;
        let resources = extract_from_plan(plan).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "nested"]);
    }

    #[test]
    fn test_plan_agent_attaches_to_all_resources() {
        let plan = r#"{
            "planned_values": {
                "root_module": {
                    "resources": [
                        {"mode": "managed", "type": "null_resource", "name": "A", "values": {}},
                        {"mode": "managed", "type": "fake_agent", "name": "dev",
                         "values": {"id": "planned-id"}}
                    ]
                }
            }
        }"#;
        let resources = extract_from_plan(plan).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].agents[0].id, "planned-id");
    }

    #[test]
    fn test_invalid_state_is_an_error() {
        assert!(extract_from_state(b"not json").is_err());
    }
}
