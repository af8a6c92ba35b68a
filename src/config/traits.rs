use crate::error::GarpError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), GarpError>;
    fn to_manifest(&self) -> ConfigManifest;
}

/// Declared parameter metadata for a configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigManifest {
    pub section: String,
    pub fields: Vec<FieldManifest>,
}

impl ConfigManifest {
    pub fn field(&self, name: &str) -> Option<&FieldManifest> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks `value` against the declared limits of field `name`.
    pub fn check(&self, name: &str, value: f64) -> Result<(), GarpError> {
        let field = self.field(name).ok_or_else(|| {
            GarpError::Configuration(format!(
                "Parameter {} is not declared in section {}",
                name, self.section
            ))
        })?;
        field.check(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldManifest {
    pub name: String,
    pub field_type: String,
    pub default: serde_json::Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub description: String,
}

impl FieldManifest {
    pub fn integer(name: &str, default: i64, min: Option<f64>, max: Option<f64>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "integer".to_string(),
            default: serde_json::json!(default),
            min,
            max,
            description: description.to_string(),
        }
    }

    pub fn real(name: &str, default: f64, min: Option<f64>, max: Option<f64>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "real".to_string(),
            default: serde_json::json!(default),
            min,
            max,
            description: description.to_string(),
        }
    }

    pub fn has_lower_limit(&self) -> bool {
        self.min.is_some()
    }

    pub fn has_upper_limit(&self) -> bool {
        self.max.is_some()
    }

    pub fn check(&self, value: f64) -> Result<(), GarpError> {
        if !value.is_finite() {
            return Err(GarpError::Configuration(format!(
                "Parameter {} is not set properly ({})",
                self.name, value
            )));
        }
        if let Some(min) = self.min {
            if value < min {
                return Err(GarpError::Configuration(format!(
                    "Parameter {} must be at least {} (got {})",
                    self.name, min, value
                )));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(GarpError::Configuration(format!(
                    "Parameter {} must be at most {} (got {})",
                    self.name, max, value
                )));
            }
        }
        Ok(())
    }
}
