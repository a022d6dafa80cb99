//! JSON-RPC 2.0 envelope and error type for the Zabbix API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Path of the API entry point below the frontend URL.
pub const API_PATH: &str = "/api_jsonrpc.php";

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: String,
}

impl RpcResponse {
    /// Split the envelope into the `result` payload or an API error.
    pub fn into_result(self) -> Result<Value, ZabbixError> {
        if let Some(err) = self.error {
            return Err(ZabbixError::Api {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        self.result
            .ok_or_else(|| ZabbixError::Decode("response carries neither result nor error".into()))
    }
}

/// Errors raised by [`crate::ZabbixClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZabbixError {
    /// Connection, TLS or timeout failure.
    Transport(String),
    /// Non-success HTTP status from the frontend.
    Http { status: u16 },
    /// JSON-RPC error envelope.
    Api {
        code: i64,
        message: String,
        data: String,
    },
    /// Payload did not have the expected shape.
    Decode(String),
}

impl fmt::Display for ZabbixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZabbixError::Transport(msg) => write!(f, "transport error: {msg}"),
            ZabbixError::Http { status } => write!(f, "unexpected http status {status}"),
            ZabbixError::Api {
                code,
                message,
                data,
            } if data.is_empty() => write!(f, "api error {code}: {message}"),
            ZabbixError::Api {
                code,
                message,
                data,
            } => write!(f, "api error {code}: {message} {data}"),
            ZabbixError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ZabbixError {}

impl From<reqwest::Error> for ZabbixError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ZabbixError::Http {
                status: status.as_u16(),
            },
            None if e.is_decode() => ZabbixError::Decode(e.to_string()),
            None => ZabbixError::Transport(e.to_string()),
        }
    }
}
