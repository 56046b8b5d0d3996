//! Runtime shape descriptors for every wire type.
//!
//! # Design
//! Each wire type is declared once through the `shape!` macro, which emits
//! both the serde struct and its `FIELDS` table, so the compile-time type and
//! the runtime validator share a single source. Validation walks the table
//! against an arbitrary `serde_json::Value`, collects every issue it finds,
//! and only then hands the value to serde. It never panics: any value either
//! becomes the typed struct or a list of `ValidationIssue`s.
//!
//! Unknown fields are ignored. Optional fields treat absence and `null` the
//! same way and both decode to `None`.

use std::fmt;

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// One problem found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted field path, e.g. `items[2].domain`. Empty for the root.
    pub path: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Re-roots the issue under `prefix`.
    pub fn nested(self, prefix: &str) -> Self {
        let path = if self.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.path)
        };
        Self { path, ..self }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// Value constraint for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer,
    PositiveInteger,
    NonNegativeInteger,
    Boolean,
    String,
    NonEmptyString,
    /// Absolute `http` or `https` URL with a host.
    HttpUrl,
    /// RFC 3339 timestamp string.
    Timestamp,
    Object,
    Array,
    Any,
}

impl Kind {
    fn check(self, value: &Value) -> Option<&'static str> {
        let ok = match self {
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::PositiveInteger => value.as_u64().is_some_and(|n| n > 0),
            Kind::NonNegativeInteger => value.is_u64(),
            Kind::Boolean => value.is_boolean(),
            Kind::String => value.is_string(),
            Kind::NonEmptyString => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Kind::HttpUrl => value.as_str().is_some_and(is_http_url),
            Kind::Timestamp => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            Kind::Object => value.is_object(),
            Kind::Array => value.is_array(),
            Kind::Any => true,
        };
        if ok {
            return None;
        }
        Some(match self {
            Kind::Integer => "expected an integer",
            Kind::PositiveInteger => "expected a positive integer",
            Kind::NonNegativeInteger => "expected a non-negative integer",
            Kind::Boolean => "expected a boolean",
            Kind::String => "expected a string",
            Kind::NonEmptyString => "expected a non-empty string",
            Kind::HttpUrl => "expected an http(s) url",
            Kind::Timestamp => "expected an RFC 3339 timestamp",
            Kind::Object => "expected an object",
            Kind::Array => "expected an array",
            Kind::Any => "unexpected value",
        })
    }
}

fn is_http_url(s: &str) -> bool {
    Url::parse(s)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    /// May be absent or `null`.
    Optional,
}

/// Kind plus presence, as written in a `shape!` declaration.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub kind: Kind,
    pub presence: Presence,
}

pub const fn required(kind: Kind) -> Rule {
    Rule {
        kind,
        presence: Presence::Required,
    }
}

pub const fn optional(kind: Kind) -> Rule {
    Rule {
        kind,
        presence: Presence::Optional,
    }
}

/// A named field of a shape.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub rule: Rule,
}

impl Field {
    pub const fn new(name: &'static str, rule: Rule) -> Self {
        Self { name, rule }
    }
}

/// Checks `value` against `fields`, appending issues to `issues`.
pub fn check_fields(fields: &[Field], value: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(object) = value.as_object() else {
        issues.push(ValidationIssue::new("", "expected an object"));
        return;
    };
    for field in fields {
        match (object.get(field.name), field.rule.presence) {
            (None, Presence::Required) => {
                issues.push(ValidationIssue::new(field.name, "is required"));
            }
            (Some(Value::Null), Presence::Required) => {
                issues.push(ValidationIssue::new(field.name, "must not be null"));
            }
            (None | Some(Value::Null), Presence::Optional) => {}
            (Some(v), _) => {
                if let Some(reason) = field.rule.kind.check(v) {
                    issues.push(ValidationIssue::new(field.name, reason));
                }
            }
        }
    }
}

/// A wire type with a runtime validator.
pub trait Schema: Serialize + DeserializeOwned {
    /// Human readable shape name, used in log lines.
    const NAME: &'static str;
    const FIELDS: &'static [Field];

    fn validate(value: &Value) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        check_fields(Self::FIELDS, value, &mut issues);
        if !issues.is_empty() {
            return Err(issues);
        }
        // The descriptors cover every constraint serde enforces except
        // numeric range, which surfaces here.
        serde_json::from_value(value.clone()).map_err(|e| vec![ValidationIssue::new("", e.to_string())])
    }
}

/// Validates caller input and returns the normalized JSON payload.
///
/// The input is serialized, validated against its own descriptors and
/// re-serialized from the validated value, so the payload holds only schema
/// fields and omits absent optionals.
pub fn validate_input<T: Schema>(input: &T) -> Result<Value, Vec<ValidationIssue>> {
    let raw = serde_json::to_value(input).map_err(|e| vec![ValidationIssue::new("", e.to_string())])?;
    let validated = T::validate(&raw)?;
    serde_json::to_value(&validated).map_err(|e| vec![ValidationIssue::new("", e.to_string())])
}

/// Declares a wire struct together with its field descriptor table.
///
/// ```ignore
/// shape! {
///     pub struct Example: "example" {
///         pub id: u64 = required(Kind::Integer),
///         #[serde(skip_serializing_if = "Option::is_none")]
///         pub note: Option<String> = optional(Kind::String),
///     }
/// }
/// ```
macro_rules! shape {
    (
        $(#[$meta:meta])*
        pub struct $name:ident : $label:literal {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty = $rule:expr,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::schema::Schema for $name {
            const NAME: &'static str = $label;
            const FIELDS: &'static [$crate::schema::Field] = &[
                $( $crate::schema::Field::new(stringify!($field), $rule), )*
            ];
        }
    };
}

pub(crate) use shape;
