//! # Tool Parameter Schemas
//!
//! Every tool declares its parameters up front. The registry validates an
//! incoming `params` object against that declaration before the handler
//! runs, so a malformed call is always reported as `Invalid parameters`
//! and never reaches hardware.
//!
//! ## Example
//!
//! ```rust,ignore
//! use clawlink_agent::schema::{ParamKind, ToolSpec};
//!
//! let spec = ToolSpec::new("pwm_start", "Start PWM on a GPIO pin")
//!     .required("pin", ParamKind::Integer, "GPIO pin number")
//!     .optional("frequency", ParamKind::Integer, json!(1000), "PWM frequency in Hz")
//!     .non_idempotent();
//!
//! let params = spec.validate(&json!({"pin": 15}))?;
//! assert_eq!(params.u32("frequency")?, 1000);
//! ```

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

impl Display for ParamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `params` object was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("params must be an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("missing required parameter '{0}'")]
    Missing(String),

    #[error("unexpected parameter '{0}'")]
    Unexpected(String),

    #[error("parameter '{name}' must be {expected}, found {found}")]
    WrongType {
        name: String,
        expected: ParamKind,
        found: &'static str,
    },

    #[error("parameter '{name}' out of range: {detail}")]
    OutOfRange { name: String, detail: String },
}

impl ParamError {
    pub fn out_of_range(name: &str, detail: impl Into<String>) -> Self {
        Self::OutOfRange {
            name: name.to_owned(),
            detail: detail.into(),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub description: String,
}

/// Name, description and parameter schema of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Safe to execute twice when a reply was lost.
    pub idempotent: bool,
    /// Accepts any parameters without validation.
    #[serde(skip)]
    untyped: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            idempotent: true,
            untyped: false,
        }
    }

    /// A tool without a declared schema. Any `params` object is passed through.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            untyped: true,
            ..Self::new(name, "")
        }
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: description.into(),
        });
        self
    }

    /// Optional parameter filled with `default` when absent. A `null`
    /// default leaves the parameter unset for the handler.
    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
            description: description.into(),
        });
        self
    }

    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    pub fn is_untyped(&self) -> bool {
        self.untyped
    }

    /// Check `params` (an object or `null`) and fill in defaults.
    ///
    /// An explicit `null` counts as absent.
    pub fn validate(&self, params: &Value) -> Result<ToolParams, ParamError> {
        let supplied = match params {
            Value::Null => Map::new(),
            Value::Object(obj) => obj.clone(),
            other => {
                return Err(ParamError::NotAnObject {
                    found: value_type_name(other),
                })
            }
        };

        if self.untyped {
            return Ok(ToolParams(supplied));
        }

        if let Some(unknown) = supplied
            .keys()
            .find(|key| !self.params.iter().any(|param| &param.name == *key))
        {
            return Err(ParamError::Unexpected(unknown.clone()));
        }

        let mut validated = Map::new();
        for param in &self.params {
            match supplied.get(&param.name).filter(|value| !value.is_null()) {
                Some(value) => {
                    validate_type(value, param)?;
                    validated.insert(param.name.clone(), value.clone());
                }
                None if param.required => return Err(ParamError::Missing(param.name.clone())),
                None => {
                    if let Some(default) = param.default.as_ref().filter(|value| !value.is_null()) {
                        validated.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(ToolParams(validated))
    }

    /// Function-calling descriptor in the shape LLM tool APIs accept.
    pub fn function_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut property = Map::new();
            if param.kind != ParamKind::Any {
                property.insert("type".into(), Value::from(param.kind.as_str()));
            }
            if param.kind == ParamKind::Array {
                property.insert("items".into(), json!({"type": "integer"}));
            }
            property.insert("description".into(), Value::from(param.description.as_str()));
            if let Some(default) = param.default.as_ref().filter(|value| !value.is_null()) {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));
            if param.required {
                required.push(Value::from(param.name.as_str()));
            }
        }

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}

fn validate_type(value: &Value, param: &ParamSpec) -> Result<(), ParamError> {
    if param.kind.matches(value) {
        Ok(())
    } else {
        Err(ParamError::WrongType {
            name: param.name.clone(),
            expected: param.kind,
            found: value_type_name(value),
        })
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validated parameters handed to a tool handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolParams(Map<String, Value>);

impl ToolParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    fn require(&self, name: &str) -> Result<&Value, ParamError> {
        self.get(name)
            .ok_or_else(|| ParamError::Missing(name.to_owned()))
    }

    fn unsigned<T: TryFrom<u64>>(&self, name: &str) -> Result<T, ParamError> {
        let value = self.require(name)?;
        let Some(number) = value.as_u64() else {
            return Err(match value.as_i64() {
                Some(negative) => ParamError::out_of_range(name, format!("{negative} is negative")),
                None => ParamError::WrongType {
                    name: name.to_owned(),
                    expected: ParamKind::Integer,
                    found: value_type_name(value),
                },
            });
        };
        T::try_from(number).map_err(|_| {
            ParamError::out_of_range(
                name,
                format!("{number} does not fit {}", std::any::type_name::<T>()),
            )
        })
    }

    pub fn u8(&self, name: &str) -> Result<u8, ParamError> {
        self.unsigned(name)
    }

    pub fn u32(&self, name: &str) -> Result<u32, ParamError> {
        self.unsigned(name)
    }

    pub fn u64(&self, name: &str) -> Result<u64, ParamError> {
        self.unsigned(name)
    }

    pub fn f64(&self, name: &str) -> Result<f64, ParamError> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| ParamError::WrongType {
            name: name.to_owned(),
            expected: ParamKind::Number,
            found: value_type_name(value),
        })
    }

    pub fn str(&self, name: &str) -> Result<&str, ParamError> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| ParamError::WrongType {
            name: name.to_owned(),
            expected: ParamKind::String,
            found: value_type_name(value),
        })
    }

    /// An array of integers in `0..=255`.
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>, ParamError> {
        let value = self.require(name)?;
        let Some(items) = value.as_array() else {
            return Err(ParamError::WrongType {
                name: name.to_owned(),
                expected: ParamKind::Array,
                found: value_type_name(value),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| {
                        ParamError::out_of_range(name, format!("item {index} is not a byte: {item}"))
                    })
            })
            .collect()
    }

    pub fn optional_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, ParamError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.bytes(name).map(Some),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
