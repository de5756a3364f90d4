//! GraphQL-style request and response envelope.
//!
//! A request names one root field of the schema together with its
//! arguments; the response follows the GraphQL `{ data, errors }` shape so
//! browser clients can treat it like any other GraphQL endpoint.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a field is read-only or mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Read-only field.
    Query,
    /// Mutating field.
    Mutation,
}

/// A single API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Query or mutation.
    pub operation: OperationKind,
    /// Root field name, e.g. `devices` or `setDeviceState`.
    pub field: String,
    /// Field arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ApiRequest {
    /// Creates a query for `field`.
    pub fn query(field: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Query,
            field: field.into(),
            arguments: Map::new(),
        }
    }

    /// Creates a mutation for `field`.
    pub fn mutation(field: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Mutation,
            field: field.into(),
            arguments: Map::new(),
        }
    }

    /// Adds an argument.
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns a required string argument.
    pub fn string_argument(&self, name: &str) -> ProtocolResult<&str> {
        match self.arguments.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ProtocolError::invalid_argument(name, "expected a string")),
            None => Err(ProtocolError::invalid_argument(name, "missing")),
        }
    }

    /// Returns an optional boolean argument.
    pub fn bool_argument(&self, name: &str) -> ProtocolResult<Option<bool>> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ProtocolError::invalid_argument(name, "expected a boolean")),
        }
    }

    /// Returns an optional numeric argument.
    pub fn number_argument(&self, name: &str) -> ProtocolResult<Option<f64>> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| ProtocolError::invalid_argument(name, "not representable")),
            Some(_) => Err(ProtocolError::invalid_argument(name, "expected a number")),
        }
    }
}

/// Machine-readable error classification, carried in `extensions.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The caller is not logged in, or the credentials were wrong.
    Unauthenticated,
    /// Unknown field or bad arguments.
    BadUserInput,
    /// The referenced device does not exist.
    NotFound,
    /// Anything else.
    InternalServerError,
}

/// Error extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    /// Error classification.
    pub code: ErrorCode,
}

/// A single entry of the response `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// User-facing message.
    pub message: String,
    /// Classification.
    pub extensions: ErrorExtensions,
}

impl ApiError {
    /// Creates an error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: ErrorExtensions { code },
        }
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        self.extensions.code
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.message, self.extensions.code)
    }
}

/// Response to an `ApiRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Field value; `null` when the field failed.
    pub data: Option<Value>,
    /// Errors, empty on success.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
}

impl ApiResponse {
    /// Creates a successful response.
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Creates a failed response.
    pub fn error(error: ApiError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    /// Returns true if no errors were reported.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the first error, if any.
    pub fn first_error(&self) -> Option<&ApiError> {
        self.errors.first()
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let request = ApiRequest::mutation("login").with_argument("password", "hunter2");
        let json: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();

        assert_eq!(json["operation"], "mutation");
        assert_eq!(json["field"], "login");
        assert_eq!(json["arguments"]["password"], "hunter2");
    }

    #[test]
    fn request_without_arguments_decodes() {
        let request = ApiRequest::decode(br#"{"operation":"query","field":"devices"}"#).unwrap();
        assert_eq!(request, ApiRequest::query("devices"));
    }

    #[test]
    fn argument_accessors() {
        let request = ApiRequest::mutation("setDeviceState")
            .with_argument("id", "lamp")
            .with_argument("isOn", true)
            .with_argument("hue", 120)
            .with_argument("saturation", Value::Null);

        assert_eq!(request.string_argument("id").unwrap(), "lamp");
        assert_eq!(request.bool_argument("isOn").unwrap(), Some(true));
        assert_eq!(request.number_argument("hue").unwrap(), Some(120.0));
        assert_eq!(request.number_argument("saturation").unwrap(), None);
        assert!(request.string_argument("missing").is_err());
        assert!(request.bool_argument("hue").is_err());
    }

    #[test]
    fn error_response_shape() {
        let response = ApiResponse::error(ApiError::new(ErrorCode::Unauthenticated, "nope"));
        let json: Value = serde_json::from_slice(&response.encode().unwrap()).unwrap();

        assert_eq!(json["data"], Value::Null);
        assert_eq!(json["errors"][0]["message"], "nope");
        assert_eq!(json["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
    }

    #[test]
    fn ok_response_omits_errors() {
        let response = ApiResponse::ok(json!(true));
        let json: Value = serde_json::from_slice(&response.encode().unwrap()).unwrap();

        assert_eq!(json["data"], true);
        assert!(json.get("errors").is_none());
        assert!(ApiResponse::decode(&response.encode().unwrap()).unwrap().is_ok());
    }
}
