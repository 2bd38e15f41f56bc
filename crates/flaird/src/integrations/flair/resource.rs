//! JSON:API documents as served by the Flair API.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;

/// Attribute map of a resource, keyed by kebab-case field name
pub type Attributes = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Links {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Relationship {
    #[serde(default)]
    pub links: Links,
}

/// One remote entity (structure, room, vent, puck, reading)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,

    pub id: String,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,

    #[serde(default)]
    pub links: Links,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, attributes: Value) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: match attributes {
                Value::Object(map) => map,
                _ => Attributes::new(),
            },
            relationships: HashMap::new(),
            links: Links::default(),
        }
    }

    /// Display name, if the resource has one
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// Display name, falling back to the remote id
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(&self.id)
    }

    /// Path of the resource itself
    pub fn self_href(&self) -> String {
        self.links
            .self_link
            .clone()
            .unwrap_or_else(|| format!("/api/{}/{}", self.kind, self.id))
    }

    /// Path of a related collection or resource
    pub fn related_href(&self, rel: &str) -> Result<&str, ApiError> {
        self.relationships
            .get(rel)
            .and_then(|r| r.links.related.as_deref())
            .ok_or_else(|| ApiError::MissingLink {
                kind: self.kind.clone(),
                id: self.id.clone(),
                rel: rel.to_string(),
            })
    }

    /// Copy of this resource with `attributes` merged over its own
    pub fn merged(&self, attributes: &Attributes) -> Self {
        let mut resource = self.clone();
        for (key, value) in attributes {
            resource.attributes.insert(key.clone(), value.clone());
        }
        resource
    }
}

/// Result of following a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Resource),
    Many(Vec<Resource>),
}

impl Related {
    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            Related::One(resource) => vec![resource],
            Related::Many(resources) => resources,
        }
    }

    pub fn into_one(self) -> Option<Resource> {
        match self {
            Related::One(resource) => Some(resource),
            Related::Many(resources) => resources.into_iter().next(),
        }
    }
}

/// Top-level JSON:API document
#[derive(Debug, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: Option<Value>,
}

impl Document {
    /// Decode the primary data. A missing or null `data` member is an empty
    /// body.
    pub fn into_related(self) -> Result<Related, ApiError> {
        match self.data {
            None | Some(Value::Null) => Err(ApiError::EmptyBody),
            Some(data @ Value::Array(_)) => serde_json::from_value(data)
                .map(Related::Many)
                .map_err(|e| ApiError::Decode(e.to_string())),
            Some(data) => serde_json::from_value(data)
                .map(Related::One)
                .map_err(|e| ApiError::Decode(e.to_string())),
        }
    }
}

/// Treat an empty relation as a relation with no members
pub fn or_empty(result: Result<Related, ApiError>) -> Result<Vec<Resource>, ApiError> {
    match result {
        Ok(related) => Ok(related.into_vec()),
        Err(ApiError::EmptyBody) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Typed read access to loosely-typed attributes
pub(crate) trait AttributeExt {
    fn f64_field(&self, key: &str) -> Option<f64>;
    fn bool_field(&self, key: &str) -> Option<bool>;
    fn str_field(&self, key: &str) -> Option<String>;
}

impl AttributeExt for Attributes {
    fn f64_field(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn str_field(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }
}
