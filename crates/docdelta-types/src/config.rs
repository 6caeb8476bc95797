use serde::{Deserialize, Serialize};

/// Configuration shared by the diff engine and the update compiler.
///
/// Both sides must agree on the identity field: the diff engine reads it
/// from old sequence elements, and the compiled update matches live
/// elements against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Field of a sequence element that holds its stable identity.
    pub identity_field: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            identity_field: "_id".to_string(),
        }
    }
}

impl DiffConfig {
    /// A configuration using `field` as the element identity.
    pub fn with_identity_field(field: impl Into<String>) -> Self {
        Self {
            identity_field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_field() {
        assert_eq!(DiffConfig::default().identity_field, "_id");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: DiffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DiffConfig::default());
    }

    #[test]
    fn custom_identity_field() {
        let config: DiffConfig = serde_json::from_str(r#"{"identity_field": "uuid"}"#).unwrap();
        assert_eq!(config, DiffConfig::with_identity_field("uuid"));
    }
}
