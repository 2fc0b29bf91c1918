use std::fmt;

use serde::{Deserialize, Serialize};

/// JSON-RPC request identifier.
///
/// The protocol allows either a string or an integer; the server echoes whichever
/// form the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Int(i64),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(value) => f.write_str(value),
            JsonRpcId::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for JsonRpcId {
    fn from(value: i64) -> Self {
        JsonRpcId::Int(value)
    }
}

impl From<&str> for JsonRpcId {
    fn from(value: &str) -> Self {
        JsonRpcId::String(value.to_string())
    }
}
