// ── Command parameters ──
//
// A parameter's type, validation spec and bound validator only change
// together, through the `with_*` setters below. There is no way to reach a
// state where `param_type` says "range" but the validator is a list check.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::validation::{ParameterType, ValidationError, Validator};

/// One positional argument of a [`Command`](crate::Command).
#[derive(Clone)]
pub struct CommandParameter {
    name: String,
    description: String,
    param_type: ParameterType,
    validation: String,
    optional: bool,
    validator: Option<Validator>,
}

impl CommandParameter {
    /// A new, untyped parameter. Values pass through unchanged until one of
    /// the `with_*` setters assigns a type.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type: ParameterType::Empty,
            validation: String::new(),
            optional: false,
            validator: ParameterType::Empty.builtin_validator(),
        }
    }

    // ── Typed setters ────────────────────────────────────────────────

    /// Free-form string; no validation.
    pub fn with_string(self) -> Self {
        self.typed(ParameterType::String, String::new())
    }

    /// Integer in hex (`0x..`), octal (`0..`) or decimal notation.
    pub fn with_numeric(self) -> Self {
        self.typed(ParameterType::Numeric, String::new())
    }

    /// Integer parsed in a fixed base.
    pub fn with_base(self, base: u32) -> Self {
        self.typed(ParameterType::Numeric, base.to_string())
    }

    /// String that must fully match `pattern`.
    pub fn with_regex(self, pattern: impl Into<String>) -> Self {
        self.typed(ParameterType::Regex, pattern.into())
    }

    /// Integer within `start..=end`; also accepts `N%` of that span.
    pub fn with_range(self, start: i64, end: i64) -> Self {
        self.with_bounds(Some(start), Some(end))
    }

    /// Integer range where either side may be open.
    pub fn with_bounds(self, start: Option<i64>, end: Option<i64>) -> Self {
        let side = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
        let spec = format!("{}:{}", side(start), side(end));
        self.typed(ParameterType::Range, spec)
    }

    /// One of a fixed set of values, matched case-insensitively.
    pub fn with_list<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let spec = values
            .into_iter()
            .map(|v| v.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("|");
        self.typed(ParameterType::List, spec)
    }

    /// Validated by a caller-supplied function. `validation` is passed to it
    /// verbatim on every call.
    pub fn with_custom<F>(mut self, validation: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, ValidationError> + Send + Sync + 'static,
    {
        self.param_type = ParameterType::Custom;
        self.validation = validation.into();
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Mark this parameter as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Rebuild a parameter from its serialized fields.
    ///
    /// `custom` cannot be expressed this way: there is no function to bind.
    pub fn from_parts(
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
        validation: impl Into<String>,
        optional: bool,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let Some(validator) = param_type.builtin_validator() else {
            return Err(ValidationError::MissingCustomValidator { parameter: name });
        };
        Ok(Self {
            name,
            description: description.into(),
            param_type,
            validation: validation.into(),
            optional,
            validator: Some(validator),
        })
    }

    fn typed(mut self, param_type: ParameterType, validation: String) -> Self {
        self.param_type = param_type;
        self.validation = validation;
        self.validator = param_type.builtin_validator();
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    pub fn validation(&self) -> &str {
        &self.validation
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Validate and normalize a raw value.
    pub fn validate(&self, value: &str) -> Result<String, ValidationError> {
        match &self.validator {
            Some(validator) => validator(value, &self.validation),
            None => Err(ValidationError::MissingCustomValidator {
                parameter: self.name.clone(),
            }),
        }
    }
}

impl fmt::Debug for CommandParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandParameter")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("param_type", &self.param_type)
            .field("validation", &self.validation)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CommandParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.param_type == other.param_type
            && self.validation == other.validation
            && self.optional == other.optional
    }
}

// ── Wire form ────────────────────────────────────────────────────────

/// Serialized shape of a parameter in a vocabulary document.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ParameterDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default)]
    pub validation: String,
    #[serde(default)]
    pub optional: bool,
}

impl From<&CommandParameter> for ParameterDocument {
    fn from(p: &CommandParameter) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone(),
            param_type: p.param_type,
            validation: p.validation.clone(),
            optional: p.optional,
        }
    }
}

impl TryFrom<ParameterDocument> for CommandParameter {
    type Error = ValidationError;

    fn try_from(doc: ParameterDocument) -> Result<Self, Self::Error> {
        Self::from_parts(
            doc.name,
            doc.description,
            doc.param_type,
            doc.validation,
            doc.optional,
        )
    }
}
