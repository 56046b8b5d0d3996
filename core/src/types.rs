//! Wire types for the trust management API.
//!
//! # Design
//! Every request and response shape is declared through `shape!`, so the
//! serde struct and its runtime descriptor live side by side. Output types
//! (`User`, `TrustMarkType`, `TrustMark`, `Subordinate`, ...) are what the
//! service returns; `*Options` types are what callers submit. Optional
//! fields skip serialization when `None` so request bodies never carry
//! explicit nulls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{check_fields, optional, required, shape, Field, Kind, Schema, ValidationIssue};

/// A free-form JSON object (metadata, key sets, claims).
pub type JsonObject = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

shape! {
    /// The authenticated operator.
    pub struct User: "user" {
        pub id: u64 = required(Kind::Integer),
        pub username: String = required(Kind::String),
        pub email: String = required(Kind::String),
        pub is_staff: bool = required(Kind::Boolean),
        pub is_superuser: bool = required(Kind::Boolean),
    }
}

shape! {
    pub struct LoginOptions: "login options" {
        pub username: String = required(Kind::NonEmptyString),
        pub password: String = required(Kind::NonEmptyString),
    }
}

// ---------------------------------------------------------------------------
// Trust mark types
// ---------------------------------------------------------------------------

shape! {
    pub struct TrustMarkType: "trust mark type" {
        pub id: u64 = required(Kind::Integer),
        pub tmtype: String = required(Kind::String),
        pub autorenew: bool = required(Kind::Boolean),
        pub valid_for: u32 = required(Kind::PositiveInteger),
        pub renewal_time: u32 = required(Kind::NonNegativeInteger),
        pub active: bool = required(Kind::Boolean),
    }
}

shape! {
    /// Fields left as `None` take the service defaults.
    #[derive(Default)]
    pub struct TrustMarkTypeCreateOptions: "trust mark type create options" {
        pub tmtype: String = required(Kind::NonEmptyString),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub renewal_time: Option<u32> = optional(Kind::NonNegativeInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
    }
}

shape! {
    /// Only the fields present are applied; the rest stay unchanged.
    #[derive(Default)]
    pub struct TrustMarkTypeUpdateOptions: "trust mark type update options" {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub renewal_time: Option<u32> = optional(Kind::NonNegativeInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
    }
}

// ---------------------------------------------------------------------------
// Trust marks
// ---------------------------------------------------------------------------

shape! {
    /// An issued trust mark. `expire_at` and `mark` are computed by the
    /// service when the mark is signed.
    pub struct TrustMark: "trust mark" {
        pub id: u64 = required(Kind::Integer),
        pub tmt: u64 = required(Kind::Integer),
        pub domain: String = required(Kind::String),
        pub expire_at: DateTime<Utc> = required(Kind::Timestamp),
        pub autorenew: bool = required(Kind::Boolean),
        pub active: bool = required(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub renewal_time: Option<u32> = optional(Kind::NonNegativeInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub mark: Option<String> = optional(Kind::String),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

shape! {
    /// `valid_for` and `renewal_time` may not exceed the owning type's
    /// values; the service enforces that.
    #[derive(Default)]
    pub struct TrustMarkCreateOptions: "trust mark create options" {
        pub tmt: u64 = required(Kind::Integer),
        pub domain: String = required(Kind::NonEmptyString),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub renewal_time: Option<u32> = optional(Kind::NonNegativeInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

shape! {
    #[derive(Default)]
    pub struct TrustMarkUpdateOptions: "trust mark update options" {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

impl From<&TrustMark> for TrustMarkUpdateOptions {
    /// Captures the editable state of a fetched mark, e.g. to resubmit it
    /// after changing one flag.
    fn from(mark: &TrustMark) -> Self {
        Self {
            autorenew: Some(mark.autorenew),
            active: Some(mark.active),
            additional_claims: mark.additional_claims.clone(),
        }
    }
}

shape! {
    pub struct DomainFilter: "domain filter" {
        pub domain: String = required(Kind::NonEmptyString),
    }
}

// ---------------------------------------------------------------------------
// Subordinates
// ---------------------------------------------------------------------------

shape! {
    pub struct Subordinate: "subordinate" {
        pub id: u64 = required(Kind::Integer),
        pub entityid: String = required(Kind::HttpUrl),
        pub metadata: JsonObject = required(Kind::Object),
        pub forced_metadata: JsonObject = required(Kind::Object),
        pub jwks: JsonObject = required(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub required_trustmarks: Option<String> = optional(Kind::String),
        pub valid_for: u32 = required(Kind::PositiveInteger),
        pub autorenew: bool = required(Kind::Boolean),
        pub active: bool = required(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

shape! {
    #[derive(Default)]
    pub struct SubordinateCreateOptions: "subordinate create options" {
        pub entityid: String = required(Kind::HttpUrl),
        pub metadata: JsonObject = required(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub forced_metadata: Option<JsonObject> = optional(Kind::Object),
        pub jwks: JsonObject = required(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub required_trustmarks: Option<String> = optional(Kind::String),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

impl SubordinateCreateOptions {
    /// Seeds create options from a fetched entity configuration.
    pub fn from_entity_config(entityid: impl Into<String>, config: &EntityConfig) -> Self {
        Self {
            entityid: entityid.into(),
            metadata: config.metadata.clone(),
            jwks: config.jwks.clone(),
            ..Self::default()
        }
    }
}

shape! {
    #[derive(Default)]
    pub struct SubordinateUpdateOptions: "subordinate update options" {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub metadata: Option<JsonObject> = optional(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub forced_metadata: Option<JsonObject> = optional(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub jwks: Option<JsonObject> = optional(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub required_trustmarks: Option<String> = optional(Kind::String),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valid_for: Option<u32> = optional(Kind::PositiveInteger),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub autorenew: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub active: Option<bool> = optional(Kind::Boolean),
        #[serde(skip_serializing_if = "Option::is_none")]
        pub additional_claims: Option<JsonObject> = optional(Kind::Object),
    }
}

// ---------------------------------------------------------------------------
// Entity configuration and server maintenance
// ---------------------------------------------------------------------------

shape! {
    pub struct FetchConfigOptions: "fetch config options" {
        pub url: String = required(Kind::HttpUrl),
    }
}

shape! {
    /// A remote entity's self-published configuration, as verified by the
    /// service. Only `AdminClient::fetch_entity_config` produces one.
    pub struct EntityConfig: "entity configuration" {
        metadata: JsonObject = required(Kind::Object),
        jwks: JsonObject = required(Kind::Object),
        #[serde(skip_serializing_if = "Option::is_none")]
        authority_hints: Option<Vec<String>> = optional(Kind::Array),
        #[serde(skip_serializing_if = "Option::is_none")]
        trust_marks: Option<Vec<Value>> = optional(Kind::Array),
    }
}

impl EntityConfig {
    pub fn metadata(&self) -> &JsonObject {
        &self.metadata
    }

    pub fn jwks(&self) -> &JsonObject {
        &self.jwks
    }

    pub fn authority_hints(&self) -> &[String] {
        self.authority_hints.as_deref().unwrap_or_default()
    }

    pub fn trust_marks(&self) -> &[Value] {
        self.trust_marks.as_deref().unwrap_or_default()
    }
}

shape! {
    /// The trust anchor's freshly signed entity statement (compact JWS).
    pub struct EntityStatement: "entity statement" {
        pub entity_statement: String = required(Kind::NonEmptyString),
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// A page of items plus the server-side total. `count` may exceed
/// `items.len()` when the list is paginated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub items: Vec<T>,
    pub count: u64,
}

impl<T: Schema> Schema for Envelope<T> {
    const NAME: &'static str = "envelope";
    const FIELDS: &'static [Field] = &[
        Field::new("items", required(Kind::Array)),
        Field::new("count", required(Kind::NonNegativeInteger)),
    ];

    fn validate(value: &Value) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        check_fields(Self::FIELDS, value, &mut issues);
        if !issues.is_empty() {
            return Err(issues);
        }

        let count = value["count"].as_u64().unwrap_or_default();
        let raw_items = value["items"].as_array().map(Vec::as_slice).unwrap_or_default();
        let mut items = Vec::with_capacity(raw_items.len());
        for (index, item) in raw_items.iter().enumerate() {
            match T::validate(item) {
                Ok(item) => items.push(item),
                Err(item_issues) => {
                    let prefix = format!("items[{index}]");
                    issues.extend(item_issues.into_iter().map(|issue| issue.nested(&prefix)));
                }
            }
        }
        if !issues.is_empty() {
            return Err(issues);
        }
        Ok(Self { items, count })
    }
}

/// Limit/offset pagination for list operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}
