//! Config documents, engine settings, and the resource library.
//!
//! Rules are described by [`ConfigNode`] documents: a node has a name,
//! an ordered list of key/value pairs (keys may repeat), and child nodes.
//! Documents are authored as JSON and mapped onto nodes:
//!
//! ```json
//! {
//!   "RESOURCE_PROCESSOR": [{
//!     "name": "Snacks",
//!     "cycleLengthSeconds": 3600,
//!     "INPUT_RESOURCE": { "resourceName": "Snacks", "amountPerCycle": 1 }
//!   }]
//! }
//! ```
//!
//! Scalars become values, objects become child nodes named after their key,
//! and arrays repeat whichever of the two their elements are.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Generic hierarchical key/value document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    pub values: Vec<(String, String)>,
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.push((key.into(), value.to_string()));
        self
    }

    pub fn with_node(mut self, node: ConfigNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Parse a JSON document into a node called `name`.
    pub fn from_json_str(name: &str, text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Object(_) => Ok(Self::from_json_value(name, &value)),
            other => Err(ConfigError::NotAnObject(json_type_name(&other).to_string())),
        }
    }

    /// Map a JSON value onto a node. Non-object values produce an empty node.
    pub fn from_json_value(name: &str, value: &Value) -> Self {
        let mut node = ConfigNode::new(name);
        let Value::Object(map) = value else {
            return node;
        };
        for (key, child) in map {
            node.absorb(key, child);
        }
        node
    }

    fn absorb(&mut self, key: &str, value: &Value) {
        match value {
            Value::Object(_) => self.nodes.push(Self::from_json_value(key, value)),
            Value::Array(items) => {
                for item in items {
                    self.absorb(key, item);
                }
            }
            Value::String(s) => self.values.push((key.to_string(), s.clone())),
            Value::Null => {}
            other => self.values.push((key.to_string(), other.to_string())),
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in document order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.trim().parse::<u32>().ok()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    /// Child nodes called `name`.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// When set, one randomly selectable outcome is added to each failure.
    pub random_penalties_enabled: bool,
    /// Post outcome messages to the notification sink.
    pub show_messages: bool,
    /// Fainting length when a faint outcome does not carry its own.
    pub faint_duration_seconds: f64,
    /// Length of one predictive simulator cycle.
    pub simulator_cycle_seconds: f64,
    /// Hard cap on simulator cycles per job.
    pub max_simulator_cycles: u32,
    /// Cycles between scheduler progress callbacks.
    pub progress_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            random_penalties_enabled: false,
            show_messages: true,
            faint_duration_seconds: 1800.0,
            simulator_cycle_seconds: 3600.0,
            max_simulator_cycles: 10_000,
            progress_interval: 1_000,
        }
    }
}

impl Settings {
    /// Read settings from a `SETTINGS` node. Absent or malformed keys keep
    /// their defaults.
    pub fn from_node(node: &ConfigNode) -> Self {
        let defaults = Self::default();
        Self {
            random_penalties_enabled: node
                .get_bool("randomPenaltiesEnabled")
                .unwrap_or(defaults.random_penalties_enabled),
            show_messages: node.get_bool("showMessages").unwrap_or(defaults.show_messages),
            faint_duration_seconds: node
                .get_f64("faintDurationSeconds")
                .unwrap_or(defaults.faint_duration_seconds),
            simulator_cycle_seconds: node
                .get_f64("simulatorCycleSeconds")
                .filter(|v| *v > 0.0)
                .unwrap_or(defaults.simulator_cycle_seconds),
            max_simulator_cycles: node
                .get_u32("maxSimulatorCycles")
                .unwrap_or(defaults.max_simulator_cycles),
            progress_interval: node
                .get_u32("progressInterval")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.progress_interval),
        }
    }
}

/// Declares a resource the processors may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    /// Roster-scoped: every individual carries their own pool.
    pub per_individual: bool,
    pub default_amount: f64,
    pub default_capacity: f64,
}

impl ResourceDefinition {
    /// A vessel-scoped resource.
    pub fn shared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            per_individual: false,
            default_amount: 0.0,
            default_capacity: 0.0,
        }
    }

    /// A roster resource seeded onto every individual.
    pub fn per_individual(name: impl Into<String>, amount: f64, capacity: f64) -> Self {
        Self {
            name: name.into(),
            per_individual: true,
            default_amount: amount.clamp(0.0, capacity.max(0.0)),
            default_capacity: capacity.max(0.0),
        }
    }

    pub fn from_node(node: &ConfigNode) -> Option<Self> {
        let name = node.get_string("name")?;
        let capacity = node.get_f64("defaultCapacity").unwrap_or(0.0);
        let amount = node.get_f64("defaultAmount").unwrap_or(0.0);
        if node.get_bool("perIndividual").unwrap_or(false) {
            Some(Self::per_individual(name, amount, capacity))
        } else {
            Some(Self::shared(name))
        }
    }
}

/// Every resource known to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLibrary {
    definitions: BTreeMap<String, ResourceDefinition>,
}

impl ResourceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `RESOURCE_DEFINITION` children of `node`.
    pub fn from_node(node: &ConfigNode) -> Self {
        let mut library = Self::new();
        for child in node.nodes_named("RESOURCE_DEFINITION") {
            match ResourceDefinition::from_node(child) {
                Some(def) => library.define(def),
                None => log::warn!("RESOURCE_DEFINITION without a name ignored"),
            }
        }
        library
    }

    pub fn define(&mut self, definition: ResourceDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDefinition> {
        self.definitions.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Roster-scoped definitions, in name order.
    pub fn per_individual(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.definitions.values().filter(|d| d.per_individual)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
