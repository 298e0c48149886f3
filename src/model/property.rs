//! Property instances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::visibility::Visibility;

/// Metadata attached to one property instance.
///
/// Shares the property's visibility; there is no per-entry visibility.
pub type Metadata = HashMap<String, Value>;

/// `(key, name, visibility)` — identifies one property instance.
///
/// Several instances may share a name (multi-valued properties) as long as
/// key or visibility differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyIdentity {
    pub key: String,
    pub name: String,
    pub visibility: Visibility,
}

impl PropertyIdentity {
    pub fn new(key: impl Into<String>, name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            visibility,
        }
    }
}

/// One property instance. Immutable; edits produce new instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    identity: PropertyIdentity,
    value: Value,
    #[serde(default)]
    metadata: Metadata,
}

impl Property {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        metadata: Metadata,
        visibility: Visibility,
    ) -> Self {
        Self {
            identity: PropertyIdentity::new(key, name, visibility),
            value: value.into(),
            metadata,
        }
    }

    pub fn identity(&self) -> &PropertyIdentity {
        &self.identity
    }

    pub fn key(&self) -> &str {
        &self.identity.key
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn visibility(&self) -> &Visibility {
        &self.identity.visibility
    }

    /// Stable instance id: the suffix stored after the separator in the
    /// property column qualifier. Equal to the key.
    pub fn instance_id(&self) -> &str {
        &self.identity.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Same value and metadata under another visibility.
    pub fn with_visibility(&self, visibility: Visibility) -> Property {
        Property {
            identity: PropertyIdentity::new(self.key(), self.name(), visibility),
            value: self.value.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Copy with one metadata entry replaced.
    pub fn with_metadata_entry(&self, key: impl Into<String>, value: impl Into<Value>) -> Property {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value.into());
        Property {
            identity: self.identity.clone(),
            value: self.value.clone(),
            metadata,
        }
    }
}
