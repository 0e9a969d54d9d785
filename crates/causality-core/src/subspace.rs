//! Subspace creation and membership events
//!
//! A subspace is a governance namespace. Its id is derived from the name, the
//! operation list and the rules, so two creators with identical parameters address the
//! same subspace.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::event::{tag_value, Tags, UnsignedEvent};
use crate::kind::EventKind;

pub const DEFAULT_IMAGE_URL: &str = "/image.png";

/// `0x` + hex SHA-256 of `name || ops || rules`
pub fn calculate_subspace_id(name: &str, ops: &str, rules: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(ops.as_bytes());
    hasher.update(rules.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Check the `0x` + 64 hex digit shape of a subspace id
pub fn validate_subspace_id(sid: &str) -> Result<()> {
    let digits = sid
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidSubspaceId(sid.to_string()))?;
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidSubspaceId(sid.to_string()));
    }
    Ok(())
}

/// Parse an operations list such as `post=30300,vote=30302`
pub fn parse_ops(ops: &str) -> Result<Vec<(String, u16)>> {
    let invalid = |reason: &str| CoreError::InvalidOps {
        ops: ops.to_string(),
        reason: reason.to_string(),
    };

    if ops.trim().is_empty() {
        return Err(invalid("empty"));
    }

    ops.split(',')
        .map(|entry| {
            let (name, kind) = entry
                .split_once('=')
                .ok_or_else(|| invalid(&format!("'{}' is not key=value", entry.trim())))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid("operation name is empty"));
            }
            let kind = kind
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid(&format!("'{}' is not a kind number", kind.trim())))?;
            Ok((name.to_string(), kind))
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Templates
// ----------------------------------------------------------------------------

/// Predefined subspace parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubspaceTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub ops: &'static str,
    pub rules: &'static str,
    pub image_url: &'static str,
}

impl SubspaceTemplate {
    pub const MODEL_DAO: SubspaceTemplate = SubspaceTemplate {
        name: "ModelDAO",
        description: "Standard ModelDAO template with predefined permission levels",
        ops: "post=30300,propose=30301,vote=30302,invite=30303,mint=30304",
        rules: "Standard DAO rules",
        image_url: DEFAULT_IMAGE_URL,
    };

    pub fn all() -> &'static [SubspaceTemplate] {
        &[Self::MODEL_DAO]
    }

    /// Case-insensitive lookup by template name
    pub fn find(name: &str) -> Option<&'static SubspaceTemplate> {
        Self::all()
            .iter()
            .find(|template| template.name.eq_ignore_ascii_case(name))
    }
}

// ----------------------------------------------------------------------------
// Subspace Create
// ----------------------------------------------------------------------------

/// Subspace creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubspaceCreate {
    pub subspace_id: String,
    pub name: String,
    pub ops: String,
    pub rules: String,
    pub description: String,
    pub image_url: String,
}

impl SubspaceCreate {
    /// Build and validate a creation payload. An empty image falls back to
    /// [`DEFAULT_IMAGE_URL`].
    pub fn new(
        name: &str,
        ops: &str,
        rules: &str,
        description: &str,
        image_url: &str,
    ) -> Result<Self> {
        let name = name.trim();
        let ops = ops.trim();
        let rules = rules.trim();
        let image_url = match image_url.trim() {
            "" => DEFAULT_IMAGE_URL,
            url => url,
        };

        let event = Self {
            subspace_id: calculate_subspace_id(name, ops, rules),
            name: name.to_string(),
            ops: ops.to_string(),
            rules: rules.to_string(),
            description: description.trim().to_string(),
            image_url: image_url.to_string(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Build from a template, overriding name and description
    pub fn from_template(
        template: &SubspaceTemplate,
        name: &str,
        description: &str,
    ) -> Result<Self> {
        Self::new(name, template.ops, template.rules, description, template.image_url)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::MissingField("name"));
        }
        if self.rules.is_empty() {
            return Err(CoreError::MissingField("rules"));
        }
        parse_ops(&self.ops)?;
        if self.description.is_empty() {
            return Err(CoreError::MissingField("description"));
        }
        if self.subspace_id != calculate_subspace_id(&self.name, &self.ops, &self.rules) {
            return Err(CoreError::InvalidSubspaceId(self.subspace_id.clone()));
        }
        Ok(())
    }

    pub fn to_unsigned(&self) -> UnsignedEvent {
        let tags: Tags = vec![
            vec!["d".into(), "subspace_create".into()],
            vec!["sid".into(), self.subspace_id.clone()],
            vec!["subspace_name".into(), self.name.clone()],
            vec!["ops".into(), self.ops.clone()],
            vec!["rules".into(), self.rules.clone()],
        ];
        let content = json!({
            "desc": self.description,
            "img_url": self.image_url,
        });
        UnsignedEvent::new(EventKind::SubspaceCreate, tags, content.to_string())
    }

    /// Recover the payload from an unsigned subspace-create event
    pub fn from_unsigned(event: &UnsignedEvent) -> Result<Self> {
        if event.kind != EventKind::SubspaceCreate.as_u16() {
            return Err(CoreError::UnknownKind(event.kind));
        }
        let tag = |key: &'static str| {
            tag_value(&event.tags, key)
                .map(str::to_string)
                .ok_or(CoreError::MissingField(key))
        };
        let content: serde_json::Value = serde_json::from_str(&event.content)?;
        let field = |key: &str| {
            content
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let parsed = Self {
            subspace_id: tag("sid")?,
            name: tag("subspace_name")?,
            ops: tag("ops")?,
            rules: tag("rules")?,
            description: field("desc"),
            image_url: field("img_url"),
        };
        parsed.validate()?;
        Ok(parsed)
    }
}

// ----------------------------------------------------------------------------
// Subspace Join
// ----------------------------------------------------------------------------

/// Request to join an existing subspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubspaceJoin {
    pub subspace_id: String,
}

impl SubspaceJoin {
    pub fn new(subspace_id: &str) -> Result<Self> {
        let subspace_id = subspace_id.trim();
        if subspace_id.is_empty() {
            return Err(CoreError::MissingField("subspace_id"));
        }
        validate_subspace_id(subspace_id)?;
        Ok(Self {
            subspace_id: subspace_id.to_string(),
        })
    }

    pub fn to_unsigned(&self) -> UnsignedEvent {
        let tags: Tags = vec![
            vec!["d".into(), "subspace_join".into()],
            vec!["sid".into(), self.subspace_id.clone()],
        ];
        UnsignedEvent::new(EventKind::SubspaceJoin, tags, "")
    }
}
