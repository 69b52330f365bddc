// ── Parameter validation ──
//
// Pure validators mapping `(raw value, validation spec)` to a normalized
// value. Each `ParameterType` resolves to one of these; `custom` parameters
// carry their own function instead.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// A validator function: `(value, validation) -> normalized value`.
pub type Validator = Arc<dyn Fn(&str, &str) -> Result<String, ValidationError> + Send + Sync>;

/// Why a parameter value (or a parameter definition) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value '{value}' did not match pattern '{pattern}'")]
    PatternMismatch { value: String, pattern: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("value '{value}' is not a valid number")]
    InvalidNumber { value: String },

    #[error("invalid numeric base {base}, expected 2..=36")]
    InvalidBase { base: i64 },

    #[error("invalid range '{spec}', expected 'lower:upper'")]
    InvalidRangeSpec { spec: String },

    #[error("range '{spec}' has its upper bound below its lower bound")]
    InvertedRange { spec: String },

    #[error("value {value} too small for range '{spec}'")]
    BelowRange { value: i64, spec: String },

    #[error("value {value} too big for range '{spec}'")]
    AboveRange { value: i64, spec: String },

    #[error("cannot use % notation on range '{spec}' without an upper bound")]
    PercentWithoutUpperBound { spec: String },

    #[error("percentage {value}% is outside 0..=100")]
    PercentOutOfRange { value: i64 },

    #[error("value '{value}' not in {allowed}")]
    NotInList { value: String, allowed: String },

    #[error("parameter '{parameter}' is custom but has no validator bound")]
    MissingCustomValidator { parameter: String },

    #[error("missing required argument '{parameter}'")]
    MissingArgument { parameter: String },

    #[error("expected at most {expected} argument(s), got {got}")]
    UnexpectedArguments { expected: usize, got: usize },

    #[error("{message}")]
    Custom { message: String },
}

/// The declared kind of a command parameter.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Not yet typed; values pass through unchanged.
    #[default]
    Empty,
    String,
    Regex,
    Numeric,
    Range,
    List,
    Custom,
}

impl ParameterType {
    /// The built-in validator for this type. `Custom` has none: its
    /// validator must be supplied explicitly.
    pub fn builtin_validator(self) -> Option<Validator> {
        let f: fn(&str, &str) -> Result<String, ValidationError> = match self {
            Self::Empty | Self::String => validate_string,
            Self::Regex => validate_regex,
            Self::Numeric => validate_numeric,
            Self::Range => validate_range,
            Self::List => validate_list,
            Self::Custom => return None,
        };
        Some(Arc::new(f))
    }
}

// ── Built-in validators ──────────────────────────────────────────────

pub fn validate_string(value: &str, _validation: &str) -> Result<String, ValidationError> {
    Ok(value.to_owned())
}

/// The whole value must match; an empty pattern accepts anything.
pub fn validate_regex(value: &str, validation: &str) -> Result<String, ValidationError> {
    if validation.is_empty() {
        return Ok(value.to_owned());
    }
    let anchored = format!("^(?:{validation})$");
    let re = Regex::new(&anchored).map_err(|e| ValidationError::InvalidPattern {
        pattern: validation.to_owned(),
        reason: e.to_string(),
    })?;
    if re.is_match(value) {
        Ok(value.to_owned())
    } else {
        Err(ValidationError::PatternMismatch {
            value: value.to_owned(),
            pattern: validation.to_owned(),
        })
    }
}

/// Parse an integer and return it in decimal.
///
/// A non-zero base in `validation` is forced; otherwise the base follows
/// the literal's prefix (`0x`, `0b`, `0o`, leading `0`, else decimal).
pub fn validate_numeric(value: &str, validation: &str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Ok("0".into());
    }
    let base = forced_base(validation)?;
    parse_int(value, base)
        .map(|n| n.to_string())
        .ok_or_else(|| ValidationError::InvalidNumber {
            value: value.to_owned(),
        })
}

/// Check a value against `lower:upper`, or scale a `N%` value into it.
///
/// Percentages are computed exactly and truncated toward zero, so `50%` of
/// `0:77` is `38`.
pub fn validate_range(value: &str, validation: &str) -> Result<String, ValidationError> {
    let (percent, number) = match value.strip_suffix('%') {
        Some(number) => (true, number),
        None => (false, value),
    };
    let ival = if number.is_empty() {
        0
    } else {
        parse_int(number, 0).ok_or_else(|| ValidationError::InvalidNumber {
            value: value.to_owned(),
        })?
    };

    let (lower, upper) = parse_bounds(validation)?;
    // A missing lower bound counts as 0 here, so ":-5" is inverted too.
    if upper.is_some_and(|hi| hi < lower.unwrap_or(0)) {
        return Err(ValidationError::InvertedRange {
            spec: validation.to_owned(),
        });
    }

    if percent {
        let Some(hi) = upper else {
            return Err(ValidationError::PercentWithoutUpperBound {
                spec: validation.to_owned(),
            });
        };
        // % notation counts from 0 when no lower bound is given
        let lo = lower.unwrap_or(0);
        if !(0..=100).contains(&ival) {
            return Err(ValidationError::PercentOutOfRange { value: ival });
        }
        let scaled =
            (i128::from(lo) * 100 + (i128::from(hi) - i128::from(lo)) * i128::from(ival)) / 100;
        return Ok(scaled.to_string());
    }

    if let Some(lo) = lower {
        if ival < lo {
            return Err(ValidationError::BelowRange {
                value: ival,
                spec: validation.to_owned(),
            });
        }
    }
    if let Some(hi) = upper {
        if ival > hi {
            return Err(ValidationError::AboveRange {
                value: ival,
                spec: validation.to_owned(),
            });
        }
    }
    Ok(ival.to_string())
}

/// Case-insensitive membership in a `|`-separated list. Returns the list's
/// own spelling of the match.
pub fn validate_list(value: &str, validation: &str) -> Result<String, ValidationError> {
    let wanted = value.to_uppercase();
    validation
        .split('|')
        .find(|candidate| candidate.to_uppercase() == wanted)
        .map(str::to_owned)
        .ok_or_else(|| ValidationError::NotInList {
            value: value.to_owned(),
            allowed: validation.to_owned(),
        })
}

// ── Helpers ──────────────────────────────────────────────────────────

fn forced_base(validation: &str) -> Result<u32, ValidationError> {
    let spec = validation.trim();
    if spec.is_empty() {
        return Ok(0);
    }
    match parse_int(spec, 0) {
        None | Some(0) => Ok(0),
        Some(base) => u32::try_from(base)
            .ok()
            .filter(|b| (2..=36).contains(b))
            .ok_or(ValidationError::InvalidBase { base }),
    }
}

fn parse_bounds(validation: &str) -> Result<(Option<i64>, Option<i64>), ValidationError> {
    let invalid = || ValidationError::InvalidRangeSpec {
        spec: validation.to_owned(),
    };
    let mut parts = validation.split(':');
    let (Some(lo), Some(hi), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let bound = |text: &str| -> Result<Option<i64>, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            parse_int(text, 0).map(Some).ok_or_else(invalid)
        }
    };
    Ok((bound(lo)?, bound(hi)?))
}

/// Integer parsing with integer-literal base inference when `base == 0`.
pub(crate) fn parse_int(text: &str, base: u32) -> Option<i64> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = if base == 0 {
        detect_radix(unsigned)
    } else {
        (base, unsigned)
    };
    // from_str_radix tolerates its own sign; a second one is malformed here
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from(u64::from_str_radix(digits, radix).ok()?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn detect_radix(digits: &str) -> (u32, &str) {
    const PREFIXES: [(&str, u32); 6] = [
        ("0x", 16),
        ("0X", 16),
        ("0b", 2),
        ("0B", 2),
        ("0o", 8),
        ("0O", 8),
    ];
    for (prefix, radix) in PREFIXES {
        if let Some(rest) = digits.strip_prefix(prefix) {
            return (radix, rest);
        }
    }
    match digits.strip_prefix('0') {
        Some(rest) if !rest.is_empty() => (8, rest),
        _ => (10, digits),
    }
}
