//! Component configuration schemas.
//!
//! Component templates describe the shape of their config as a list of
//! tagged field specs; a small interpreter validates a concrete config map
//! against that description. Field kinds are a closed enum, so validation
//! is an exhaustive match rather than runtime type inspection.

use crate::error::ValidationError;
use crate::scalar::ScalarValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a single schema field, with per-kind constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, optionally bounded in characters.
    Text { max_len: Option<usize> },
    /// Integer or float, optionally bounded.
    Number { min: Option<f64>, max: Option<f64> },
    /// Strict boolean.
    Boolean,
    /// Text restricted to a fixed set of options.
    Choice { options: Vec<String> },
    /// Text matching a regular expression (anchored to the full value).
    Pattern { pattern: String },
}

/// One declared field of a component schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Schema for a component template's config map.
///
/// Undeclared config keys are ignored; only declared fields are checked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub fields: Vec<FieldSpec>,
}

impl ComponentSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Validate a config map against this schema.
    ///
    /// Returns the first violation found: a missing required field, a kind
    /// mismatch, or a per-kind constraint failure.
    pub fn validate(&self, config: &HashMap<String, ScalarValue>) -> Result<(), ValidationError> {
        for spec in &self.fields {
            let value = match config.get(&spec.name) {
                Some(value) => value,
                None => {
                    if spec.required {
                        return Err(ValidationError::RequiredFieldMissing {
                            field: spec.name.clone(),
                        });
                    }
                    continue;
                }
            };
            validate_field(&spec.name, &spec.kind, value)?;
        }
        Ok(())
    }
}

fn validate_field(
    field: &str,
    kind: &FieldKind,
    value: &ScalarValue,
) -> Result<(), ValidationError> {
    match kind {
        FieldKind::Text { max_len } => {
            let text = value.as_text().ok_or_else(|| kind_mismatch(field, "text", value))?;
            if let Some(max) = max_len {
                let len = text.chars().count();
                if len > *max {
                    return Err(ValidationError::SchemaViolation {
                        field: field.to_string(),
                        reason: format!("text length {} exceeds max {}", len, max),
                    });
                }
            }
            Ok(())
        }
        FieldKind::Number { min, max } => {
            let n = value
                .as_number()
                .ok_or_else(|| kind_mismatch(field, "number", value))?;
            if let Some(min) = min {
                if n < *min {
                    return Err(ValidationError::SchemaViolation {
                        field: field.to_string(),
                        reason: format!("{} is below minimum {}", n, min),
                    });
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(ValidationError::SchemaViolation {
                        field: field.to_string(),
                        reason: format!("{} is above maximum {}", n, max),
                    });
                }
            }
            Ok(())
        }
        FieldKind::Boolean => match value {
            ScalarValue::Boolean(_) => Ok(()),
            other => Err(kind_mismatch(field, "boolean", other)),
        },
        FieldKind::Choice { options } => {
            let text = value
                .as_text()
                .ok_or_else(|| kind_mismatch(field, "choice", value))?;
            if options.iter().any(|opt| opt == text) {
                Ok(())
            } else {
                Err(ValidationError::SchemaViolation {
                    field: field.to_string(),
                    reason: format!("'{}' is not one of {:?}", text, options),
                })
            }
        }
        FieldKind::Pattern { pattern } => {
            let text = value
                .as_text()
                .ok_or_else(|| kind_mismatch(field, "pattern", value))?;
            let anchored = format!("^(?:{})$", pattern);
            let re = Regex::new(&anchored).map_err(|e| ValidationError::SchemaViolation {
                field: field.to_string(),
                reason: format!("invalid pattern: {}", e),
            })?;
            if re.is_match(text) {
                Ok(())
            } else {
                Err(ValidationError::SchemaViolation {
                    field: field.to_string(),
                    reason: format!("'{}' does not match pattern '{}'", text, pattern),
                })
            }
        }
    }
}

fn kind_mismatch(field: &str, expected: &str, value: &ScalarValue) -> ValidationError {
    ValidationError::SchemaViolation {
        field: field.to_string(),
        reason: format!("expected {}, got {}", expected, value.kind_name()),
    }
}
