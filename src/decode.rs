use crate::{GetResponse, ResponseValue};

/// Shown for a response whose value is absent or of a kind we do not know.
pub const UNKNOWN_TYPE: &str = "unknown type";

/// Turn a get response's value into display text. Never fails.
pub fn decode(resp: &GetResponse) -> String {
    match &resp.value {
        Some(ResponseValue::Text(s)) => s.clone(),
        Some(ResponseValue::Int(n)) => n.to_string(),
        Some(ResponseValue::Unknown) | None => UNKNOWN_TYPE.to_string(),
    }
}
