//! JSON-RPC 2.0 wire types. The request envelope carries one non-standard
//! member: the top-level bearer `token`.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// A `"Model.method"` name, always exactly two non-empty dot-separated
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodName {
    pub model: String,
    pub method: String,
}

impl MethodName {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (model, method) = raw.split_once('.')?;
        if model.is_empty() || method.is_empty() || method.contains('.') {
            return None;
        }
        Some(Self {
            model: model.to_string(),
            method: method.to_string(),
        })
    }

    #[must_use]
    pub fn full(&self) -> String {
        format!("{}.{}", self.model, self.method)
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.model, self.method)
    }
}

/// Error codes on the wire: the JSON-RPC 2.0 standard range plus the
/// gateway's custom `-32000..` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    MissingToken,
    InvalidToken,
    InvalidCredentials,
    IdentityNotFound,
    InvalidEmail,
    InvalidPassword,
    UsernameTaken,
    NotAllowedForVisitors,
    InvalidParamsFormat,
    EmptyParamValue,
    ItemNotFound,
    AccountExpired,
    AppVersionDeprecated,
}

impl RpcErrorCode {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::MissingToken => -32000,
            Self::InvalidToken => -32001,
            Self::InvalidCredentials => -32002,
            Self::IdentityNotFound => -32003,
            Self::InvalidEmail => -32004,
            Self::InvalidPassword => -32005,
            Self::UsernameTaken => -32006,
            Self::NotAllowedForVisitors => -32007,
            Self::InvalidParamsFormat => -32008,
            Self::EmptyParamValue => -32009,
            Self::ItemNotFound => -32010,
            Self::AccountExpired => -32011,
            Self::AppVersionDeprecated => -32012,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let known = [
            Self::ParseError,
            Self::InvalidRequest,
            Self::MethodNotFound,
            Self::InvalidParams,
            Self::InternalError,
            Self::MissingToken,
            Self::InvalidToken,
            Self::InvalidCredentials,
            Self::IdentityNotFound,
            Self::InvalidEmail,
            Self::InvalidPassword,
            Self::UsernameTaken,
            Self::NotAllowedForVisitors,
            Self::InvalidParamsFormat,
            Self::EmptyParamValue,
            Self::ItemNotFound,
            Self::AccountExpired,
            Self::AppVersionDeprecated,
        ];
        known.into_iter().find(|candidate| candidate.code() == code)
    }
}

impl Serialize for RpcErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for RpcErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown rpc error code {code}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: RpcErrorCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    #[must_use]
    pub fn failure(error: RpcError, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn method_name_requires_exactly_two_segments() {
        let name = MethodName::parse("user.login").expect("two segments");
        assert_eq!(name.model, "user");
        assert_eq!(name.method, "login");
        assert!(MethodName::parse("user").is_none());
        assert!(MethodName::parse("user.").is_none());
        assert!(MethodName::parse(".login").is_none());
        assert!(MethodName::parse("user.login.extra").is_none());
    }

    #[test]
    fn error_codes_serialize_as_negative_integers() {
        let error = RpcError::new(RpcErrorCode::MissingToken, "Token is required");
        let value = serde_json::to_value(&error).expect("serialize");
        assert_eq!(value, json!({"code": -32000, "message": "Token is required"}));
    }

    #[test]
    fn error_data_round_trips() {
        let error = RpcError::with_data(
            RpcErrorCode::AccountExpired,
            "User account validity expired",
            json!({"email": "user@example.com"}),
        );
        let value = serde_json::to_value(&error).expect("serialize");
        assert_eq!(value["code"], json!(-32011));
        assert_eq!(value["data"]["email"], json!("user@example.com"));
        let parsed: RpcError = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed.code, RpcErrorCode::AccountExpired);
    }

    #[test]
    fn request_envelope_accepts_the_token_member() {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "user.findprofile",
            "params": {},
            "token": "abc",
            "id": 7
        }))
        .expect("deserialize");
        assert_eq!(request.token.as_deref(), Some("abc"));
        assert_eq!(request.id, Some(json!(7)));
    }

    #[test]
    fn success_envelope_keeps_null_results_explicit() {
        let response = JsonRpcResponse::success(Value::Null, json!(1));
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value, json!({"jsonrpc": "2.0", "result": null, "id": 1}));
    }
}
