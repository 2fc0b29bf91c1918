//! JSON-RPC envelopes and message classification.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use xcode_bsp_types::JsonRpcId;

use crate::codec::{InvalidMessageError, InvalidMessageReason};

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

/// The minimal shape every incoming message must decode against.
#[derive(Debug, Deserialize)]
struct Envelope {
    method: String,
    #[serde(default)]
    id: Option<JsonRpcId>,
}

/// A framed message classified by the presence of `id`.
///
/// The raw body is retained so handlers can decode `params` into their own types.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    method: String,
    id: Option<JsonRpcId>,
    body: Vec<u8>,
}

impl IncomingMessage {
    pub fn parse(body: Vec<u8>) -> Result<Self, InvalidMessageError> {
        match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) => Ok(Self {
                method: envelope.method,
                id: envelope.id,
                body,
            }),
            Err(e) => Err(InvalidMessageError::new(
                InvalidMessageReason::DecodeBody(e),
                body,
            )),
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn id(&self) -> Option<&JsonRpcId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Decode `params`; a missing `params` member decodes from `null`.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        #[derive(Deserialize)]
        struct WithParams {
            #[serde(default)]
            params: serde_json::Value,
        }

        let with_params: WithParams = serde_json::from_slice(&self.body)?;
        serde_json::from_value(with_params.params)
    }
}

#[derive(Debug, Serialize)]
pub struct Response<T> {
    pub jsonrpc: &'static str,
    pub id: JsonRpcId,
    pub result: T,
}

impl<T: Serialize> Response<T> {
    pub fn new(id: JsonRpcId, result: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub jsonrpc: &'static str,
    pub id: JsonRpcId,
    pub error: ResponseError,
}

impl ErrorResponse {
    pub fn new(id: JsonRpcId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ResponseError {
                code,
                message: message.into(),
            },
        }
    }

    pub fn method_not_found(id: JsonRpcId, method: &str) -> Self {
        Self::new(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct Notification<T> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<T>,
}

impl<T: Serialize> Notification<T> {
    pub fn new(method: &'static str, params: Option<T>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

/// `file://` URI of a directory, always ending in `/`.
pub fn directory_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_directory_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

/// Filesystem path of a `file://` URI; `None` for other schemes or malformed URIs.
#[must_use]
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_not_notification() {
        let msg = IncomingMessage::parse(
            br#"{"jsonrpc":"2.0","id":3,"method":"build/initialize","params":{}}"#.to_vec(),
        )
        .unwrap();
        assert_eq!(msg.method(), "build/initialize");
        assert_eq!(msg.id(), Some(&JsonRpcId::Int(3)));
        assert!(!msg.is_notification());
    }

    #[test]
    fn test_missing_id_is_notification() {
        let msg =
            IncomingMessage::parse(br#"{"jsonrpc":"2.0","method":"build/exit"}"#.to_vec()).unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn test_string_id() {
        let msg = IncomingMessage::parse(br#"{"id":"abc","method":"build/shutdown"}"#.to_vec())
            .unwrap();
        assert_eq!(msg.id(), Some(&JsonRpcId::String("abc".into())));
    }

    #[test]
    fn test_missing_method_is_invalid() {
        let err = IncomingMessage::parse(br#"{"jsonrpc":"2.0","id":1}"#.to_vec()).unwrap_err();
        assert!(matches!(err.reason, InvalidMessageReason::DecodeBody(_)));
        assert_eq!(err.data, br#"{"jsonrpc":"2.0","id":1}"#);
    }

    #[test]
    fn test_invalid_json_body() {
        let err = IncomingMessage::parse(b"not valid json!!!".to_vec()).unwrap_err();
        assert!(err.to_string().contains("not valid json!!!"));
    }

    #[test]
    fn test_params_decoding() {
        #[derive(Deserialize)]
        struct Params {
            uri: String,
        }

        let msg = IncomingMessage::parse(
            br#"{"id":1,"method":"m","params":{"uri":"file:///a.swift"}}"#.to_vec(),
        )
        .unwrap();
        let params: Params = msg.params().unwrap();
        assert_eq!(params.uri, "file:///a.swift");
    }

    #[test]
    fn test_absent_params_decode_as_null() {
        let msg = IncomingMessage::parse(br#"{"id":1,"method":"m"}"#.to_vec()).unwrap();
        let params: Option<serde_json::Value> = msg.params().unwrap();
        assert!(params.is_none());
    }

    #[test]
    fn test_response_serialization_with_null_result() {
        let json = serde_json::to_value(Response::new(JsonRpcId::Int(1), ())).unwrap();
        assert_eq!(json, serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": null}));
    }

    #[test]
    fn test_method_not_found_response() {
        let json = serde_json::to_value(ErrorResponse::method_not_found(
            JsonRpcId::from("x"),
            "foo/bar",
        ))
        .unwrap();
        assert_eq!(json["id"], "x");
        assert_eq!(json["error"]["code"], -32601);
        assert_eq!(json["error"]["message"], "Method not found: foo/bar");
    }

    #[test]
    fn test_notification_serialization_without_params() {
        let notif = Notification::<()>::new("build/exit", None);
        let json = serde_json::to_value(&notif).unwrap();
        assert_eq!(json["method"], "build/exit");
        assert!(json.get("params").is_none(), "params must be omitted, not null");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_path_to_file_uri_and_back() {
        let path = PathBuf::from("/Users/test/App/Sources/main.swift");
        let uri = path_to_file_uri(&path).expect("should create URI");
        assert_eq!(uri.as_str(), "file:///Users/test/App/Sources/main.swift");
        assert_eq!(file_uri_to_path(uri.as_str()), Some(path));
    }

    #[test]
    fn test_directory_uri_has_trailing_slash() {
        let uri = directory_uri(Path::new("/p/Sources")).unwrap();
        assert_eq!(uri.as_str(), "file:///p/Sources/");
    }

    #[test]
    fn test_file_uri_to_path_rejects_other_schemes() {
        assert!(file_uri_to_path("not-a-uri").is_none());
        assert!(file_uri_to_path("https://example.com/test.swift").is_none());
    }
}
