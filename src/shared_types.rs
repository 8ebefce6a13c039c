use std::collections::BTreeMap;
use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub mod commands;
pub mod config;
pub mod decode;
pub mod error;
pub mod invoker;
pub mod storage;
pub mod store;

pub use commands::{BulkGetReport, BurstResult, GetReport, MenuChoice, Session, SetReport};
pub use error::HarnessError;
pub use storage::{connect, Storage};
pub use store::Store;

/// A value written by a set request. Exactly one alternative is carried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Text(String),
    Int(i64),
}

/// A value returned by the service. Kinds this build does not know about,
/// with or without a payload, land in `Unknown`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum ResponseValue {
    Text(String),
    Int(i64),
    Unknown,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Known(Value),
    Other(IgnoredAny),
}

impl<'de> Deserialize<'de> for ResponseValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match WireValue::deserialize(deserializer)? {
            WireValue::Known(value) => value.into(),
            WireValue::Other(_) => ResponseValue::Unknown,
        })
    }
}

impl From<Value> for ResponseValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => ResponseValue::Text(s),
            Value::Int(n) => ResponseValue::Int(n),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub tags: BTreeMap<String, String>,
}

impl Metadata {
    pub fn tag(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(name.into(), value.into());
        Metadata { tags }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.tags.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    pub metadata: Option<Metadata>,
}

impl SetRequest {
    /// A set request carrying the text alternative and no metadata.
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        SetRequest {
            key: key.into(),
            value: Value::Text(value.into()),
            metadata: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub value: Option<ResponseValue>,
    pub metadata: Metadata,
}

/// Sub-requests are answered in order: `responses[i]` belongs to `requests[i]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkGetRequest {
    pub requests: Vec<GetRequest>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkGetResponse {
    pub responses: Vec<GetResponse>,
}

#[tarpc::service]
pub trait StorageService {
    /// Store a value under a key
    async fn set(req: SetRequest) -> SetResponse;
    /// Get a value by key
    async fn get(req: GetRequest) -> GetResponse;
    /// Get several keys in one call
    async fn bulk_get(req: BulkGetRequest) -> BulkGetResponse;
}
