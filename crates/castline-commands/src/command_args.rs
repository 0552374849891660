//! Typed argument binding for command option schemas.

use thiserror::Error;

use crate::command_registry::{OptionKind, OptionSpec};

#[derive(Debug, Clone, PartialEq)]
/// One bound argument value, aligned with an [`OptionSpec`].
pub enum ArgValue {
    /// `None` when the argument tokens were exhausted.
    Text(Option<String>),
    /// `NaN` when the token was missing or not numeric.
    Number(f64),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Argument values bound 1:1 to a command's options.
pub struct ParsedArgs {
    values: Vec<ArgValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required argument <{name}>")]
/// Raised by handlers that require a positional argument the operator omitted.
pub struct MissingArgument {
    pub name: String,
}

impl ParsedArgs {
    pub fn new(values: Vec<ArgValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        match self.values.get(index) {
            Some(ArgValue::Text(value)) => value.as_deref(),
            _ => None,
        }
    }

    pub fn number(&self, index: usize) -> f64 {
        match self.values.get(index) {
            Some(ArgValue::Number(value)) => *value,
            _ => f64::NAN,
        }
    }

    pub fn flag(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(ArgValue::Flag(true)))
    }

    pub fn require_text(&self, index: usize, name: &str) -> Result<&str, MissingArgument> {
        self.text(index).ok_or_else(|| MissingArgument {
            name: name.to_string(),
        })
    }
}

/// Coerces a token the way a lenient numeric conversion would.
///
/// Missing tokens and non-numeric text become `NaN`; blank text becomes `0`.
pub fn coerce_number(token: Option<&str>) -> f64 {
    let Some(token) = token else {
        return f64::NAN;
    };
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let unsigned = trimmed.trim_start_matches(&['+', '-'][..]);
    if unsigned == "Infinity" {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    // Rust also accepts "inf"/"nan" spellings; only digits, sign, dot and exponent count here.
    if !trimmed
        .chars()
        .all(|candidate| candidate.is_ascii_digit() || matches!(candidate, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn flag_token_name(token: &str) -> Option<&str> {
    token.strip_prefix('-')
}

/// Binds argument tokens to `options` in order using a single cursor.
///
/// String and number options always consume the token at the cursor. Flag
/// options only consume it when it is exactly `-<name>`; otherwise they bind
/// `false` and leave the token for the next option. Unconsumed tokens are
/// ignored, so binding never fails.
pub fn bind_arguments(options: &[OptionSpec], tokens: &[String]) -> ParsedArgs {
    let mut cursor = 0_usize;
    let mut values = Vec::with_capacity(options.len());

    for option in options {
        let current = tokens.get(cursor).map(String::as_str);
        match option.kind {
            OptionKind::String => {
                values.push(ArgValue::Text(current.map(str::to_string)));
                cursor += 1;
            }
            OptionKind::Number => {
                values.push(ArgValue::Number(coerce_number(current)));
                cursor += 1;
            }
            OptionKind::Flag => {
                let present = current
                    .and_then(flag_token_name)
                    .is_some_and(|name| name == option.name);
                if present {
                    cursor += 1;
                }
                values.push(ArgValue::Flag(present));
            }
        }
    }

    ParsedArgs::new(values)
}
