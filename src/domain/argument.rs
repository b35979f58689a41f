//! Argument descriptors
//!
//! An [`ArgumentDescriptor`] describes one command-line argument of a task:
//! how it is spelled (`-t`, `--test`, or positionally), whether it takes
//! values, how many, and what type they are coerced to.

use serde::{Deserialize, Deserializer, Serialize};

use super::path::validate_name;
use super::value::ValueType;
use super::DescriptorError;

fn default_takes_value() -> bool {
    true
}

/// Describes one argument of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDescriptor {
    /// Name, unique within the owning command; key of the bound value
    pub name: String,

    /// Whether the argument consumes values; `false` makes it a boolean flag
    #[serde(default = "default_takes_value")]
    pub takes_value: bool,

    /// Legacy spelling for `takes_value = false`
    #[serde(default, skip_serializing)]
    pub is_flag: bool,

    /// Declared type of the values (defaults to string, bool for flags)
    #[serde(default, alias = "python_type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_help: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_values: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_equals: Option<bool>,
}

impl ArgumentDescriptor {
    /// Creates a value-taking string argument with no flags (positional)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            takes_value: true,
            is_flag: false,
            value_type: None,
            default_value: None,
            short: None,
            long: None,
            help: None,
            long_help: None,
            required: None,
            multiple_values: None,
            min_values: None,
            max_values: None,
            require_equals: None,
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    /// Turns the argument into a boolean flag
    pub fn flag(mut self) -> Self {
        self.takes_value = false;
        self
    }

    pub fn of_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple_values = Some(true);
        self
    }

    pub fn values(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_values = min;
        self.max_values = max;
        self
    }

    pub fn require_equals(mut self) -> Self {
        self.require_equals = Some(true);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Folds the legacy `is_flag` spelling into `takes_value`
    pub fn normalized(mut self) -> Self {
        if self.is_flag {
            self.takes_value = false;
            self.is_flag = false;
        }
        self
    }

    /// True for boolean flags (no values)
    pub fn is_flag(&self) -> bool {
        !self.takes_value || self.is_flag
    }

    pub fn value_type(&self) -> ValueType {
        match self.value_type {
            Some(t) => t,
            None if self.is_flag() => ValueType::Bool,
            None => ValueType::String,
        }
    }

    /// Long spelling; a flag declared without any spelling answers to its name
    pub fn long_name(&self) -> Option<&str> {
        match (&self.long, self.short) {
            (Some(long), _) => Some(long.as_str()),
            (None, None) if self.is_flag() => Some(self.name.as_str()),
            _ => None,
        }
    }

    /// Value-taking arguments without any flag spelling are filled by position
    pub fn is_positional(&self) -> bool {
        !self.is_flag() && self.short.is_none() && self.long.is_none()
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn requires_equals(&self) -> bool {
        self.require_equals.unwrap_or(false)
    }

    /// Whether more than one value can be bound
    pub fn is_multi(&self) -> bool {
        self.multiple_values.unwrap_or(false)
            || self.max_values.map_or(false, |m| m > 1)
            || self.min_values.map_or(false, |m| m > 1)
    }

    /// Accepted value count as `(min, max)`; `None` max means unbounded
    pub fn arity(&self) -> (u32, Option<u32>) {
        if self.is_multi() {
            (self.min_values.unwrap_or(1), self.max_values)
        } else {
            (1, Some(1))
        }
    }

    /// The default split into items: whitespace separated for multi-valued
    /// arguments, the whole string otherwise
    pub fn default_items(&self) -> Option<Vec<&str>> {
        let default = self.default_value.as_deref()?;
        if self.is_multi() {
            Some(default.split_whitespace().collect())
        } else {
            Some(vec![default])
        }
    }

    /// Human spelling used in messages: `--long`, `-s`, or `<name>`
    pub fn display_flag(&self) -> String {
        if let Some(long) = self.long_name() {
            format!("--{}", long)
        } else if let Some(short) = self.short {
            format!("-{}", short)
        } else {
            format!("<{}>", self.name)
        }
    }

    pub fn display_short(&self) -> String {
        self.short.map(|s| format!("-{}", s)).unwrap_or_default()
    }

    /// Checks the descriptor's own invariants
    pub fn validate(&self) -> Result<(), DescriptorError> {
        validate_name(&self.name, "argument")?;

        if self.is_flag()
            && (self.multiple_values == Some(true)
                || self.min_values.is_some()
                || self.max_values.is_some())
        {
            return Err(DescriptorError::ValuesOnFlag(self.name.clone()));
        }

        if let (Some(min), Some(max)) = (self.min_values, self.max_values) {
            if min > max {
                return Err(DescriptorError::InvalidValueRange {
                    argument: self.name.clone(),
                    min,
                    max,
                });
            }
        }
        if self.max_values == Some(0) {
            return Err(DescriptorError::InvalidValueRange {
                argument: self.name.clone(),
                min: self.min_values.unwrap_or(0),
                max: 0,
            });
        }

        if let Some(short) = self.short {
            if !short.is_ascii_alphanumeric() {
                return Err(DescriptorError::InvalidFlag {
                    argument: self.name.clone(),
                    flag: format!("-{}", short),
                });
            }
        }
        if let Some(long) = &self.long {
            if long.is_empty() || long.starts_with('-') || long.contains('=') || long.contains(' ')
            {
                return Err(DescriptorError::InvalidFlag {
                    argument: self.name.clone(),
                    flag: format!("--{}", long),
                });
            }
        }

        if let Some(items) = self.default_items() {
            let value_type = self.value_type();
            if let Some(bad) = items.iter().find(|item| value_type.coerce(item).is_none()) {
                return Err(DescriptorError::InvalidDefault {
                    argument: self.name.clone(),
                    value: bad.to_string(),
                    expected: value_type,
                });
            }

            let (min, max) = self.arity();
            let count = items.len();
            // an empty default binds an empty list
            if count > 0 && (count < min as usize || max.map_or(false, |m| count > m as usize)) {
                return Err(DescriptorError::DefaultArity {
                    argument: self.name.clone(),
                    count,
                    accepted: match max {
                        Some(max) if max == min => min.to_string(),
                        Some(max) => format!("{} to {}", min, max),
                        None => format!("at least {}", min),
                    },
                });
            }
        }

        Ok(())
    }
}

/// Accepts `default_value = 3` as well as `default_value = "3"`
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.map(|scalar| match scalar {
        Scalar::Str(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}
