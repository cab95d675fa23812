//! Structured errors and error aggregation.
//!
//! [`ApiError`] is the `{message, field, isMissing}` record that appears in the
//! `errors` array of every structured response. [`MultiError`] collects them in
//! order, and [`ErrorInput`] is the closed set of values that can be turned
//! into structured errors.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::response::{JsonResponse, JsonpResponse, Response};

/// A single structured error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_missing: bool,
}

impl ApiError {
    /// An error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// An error attached to a request field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
            is_missing: false,
        }
    }

    /// A required field that was not supplied.
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            message: String::new(),
            field: field.into(),
            is_missing: true,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl std::error::Error for ApiError {}

/// Values accepted when building an error response or pushing to a
/// [`MultiError`].
///
/// Structured responses contribute their own error lists (spliced, never
/// nested). Passing any non-structured [`Response`] variant is a bug in the
/// caller and panics.
pub enum ErrorInput {
    Message(String),
    Bytes(Vec<u8>),
    Api(ApiError),
    Error(Box<dyn std::error::Error + Send + Sync>),
    Response(Response),
    Multi(MultiError),
}

impl ErrorInput {
    /// Wrap any error type.
    pub fn error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ErrorInput::Error(Box::new(err))
    }

    /// Normalize into structured errors, appending to `out`.
    ///
    /// # Panics
    ///
    /// Panics on a [`Response`] that carries no error list (redirect, file,
    /// simple, break).
    pub(crate) fn append_to(self, out: &mut Vec<ApiError>) {
        match self {
            ErrorInput::Message(msg) => out.push(ApiError::new(msg)),
            ErrorInput::Bytes(b) => out.push(ApiError::new(String::from_utf8_lossy(&b))),
            ErrorInput::Api(e) => out.push(e),
            ErrorInput::Error(e) => out.push(ApiError::new(e.to_string())),
            ErrorInput::Multi(me) => out.extend(me.0),
            ErrorInput::Response(Response::Json(r)) => out.extend(r.errors),
            ErrorInput::Response(Response::Jsonp(r)) => out.extend(r.inner.errors),
            ErrorInput::Response(other) => {
                panic!("unsupported error input: {} response", other.kind())
            }
        }
    }
}

impl fmt::Debug for ErrorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorInput::Message(m) => f.debug_tuple("Message").field(m).finish(),
            ErrorInput::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ErrorInput::Api(e) => f.debug_tuple("Api").field(e).finish(),
            ErrorInput::Error(e) => f.debug_tuple("Error").field(&e.to_string()).finish(),
            ErrorInput::Response(r) => f.debug_tuple("Response").field(&r.kind()).finish(),
            ErrorInput::Multi(m) => f.debug_tuple("Multi").field(m).finish(),
        }
    }
}

impl From<&str> for ErrorInput {
    fn from(s: &str) -> Self {
        ErrorInput::Message(s.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(s: String) -> Self {
        ErrorInput::Message(s)
    }
}

impl From<Vec<u8>> for ErrorInput {
    fn from(b: Vec<u8>) -> Self {
        ErrorInput::Bytes(b)
    }
}

impl From<&[u8]> for ErrorInput {
    fn from(b: &[u8]) -> Self {
        ErrorInput::Bytes(b.to_vec())
    }
}

impl From<Bytes> for ErrorInput {
    fn from(b: Bytes) -> Self {
        ErrorInput::Bytes(b.to_vec())
    }
}

impl From<ApiError> for ErrorInput {
    fn from(e: ApiError) -> Self {
        ErrorInput::Api(e)
    }
}

impl From<MultiError> for ErrorInput {
    fn from(me: MultiError) -> Self {
        ErrorInput::Multi(me)
    }
}

impl From<Response> for ErrorInput {
    fn from(r: Response) -> Self {
        ErrorInput::Response(r)
    }
}

impl From<JsonResponse> for ErrorInput {
    fn from(r: JsonResponse) -> Self {
        ErrorInput::Response(Response::Json(r))
    }
}

impl From<JsonpResponse> for ErrorInput {
    fn from(r: JsonpResponse) -> Self {
        ErrorInput::Response(Response::Jsonp(r))
    }
}

impl From<std::io::Error> for ErrorInput {
    fn from(e: std::io::Error) -> Self {
        ErrorInput::error(e)
    }
}

impl From<serde_json::Error> for ErrorInput {
    fn from(e: serde_json::Error) -> Self {
        ErrorInput::error(e)
    }
}

impl From<crate::core::Error> for ErrorInput {
    fn from(e: crate::core::Error) -> Self {
        match e {
            crate::core::Error::Api(me) => ErrorInput::Multi(me),
            other => ErrorInput::error(other),
        }
    }
}

/// An ordered, appendable list of structured errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiError(Vec<ApiError>);

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error, flattening aggregators and structured responses.
    pub fn push(&mut self, err: impl Into<ErrorInput>) {
        err.into().append_to(&mut self.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ApiError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ApiError] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<ApiError> {
        self.0
    }

    /// `None` when empty, otherwise the aggregate itself as an error value.
    pub fn err(self) -> Option<MultiError> {
        if self.0.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl FromIterator<ApiError> for MultiError {
    fn from_iter<I: IntoIterator<Item = ApiError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<ApiError>> for MultiError {
    fn from(errs: Vec<ApiError>) -> Self {
        Self(errs)
    }
}

impl IntoIterator for MultiError {
    type Item = ApiError;
    type IntoIter = std::vec::IntoIter<ApiError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a ApiError;
    type IntoIter = std::slice::Iter<'a, ApiError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{redirect, JsonResponse, BREAK};

    #[test]
    fn test_api_error_wire_shape() {
        let e = ApiError::field("email", "invalid");
        assert_eq!(e.to_string(), r#"{"message":"invalid","field":"email"}"#);

        let e = ApiError::missing("name");
        assert_eq!(e.to_string(), r#"{"field":"name","isMissing":true}"#);

        let e: ApiError = serde_json::from_str(r#"{"message":"m","isMissing":true}"#).unwrap();
        assert_eq!(e.message, "m");
        assert!(e.is_missing);
        assert!(e.field.is_empty());
    }

    #[test]
    fn test_multi_error_push_and_err() {
        let me = MultiError::new();
        assert!(me.err().is_none());

        let mut me = MultiError::new();
        me.push("first");
        me.push(ApiError::missing("id"));
        assert_eq!(me.len(), 2);

        let err = me.err().expect("non-empty aggregate is an error");
        assert_eq!(
            err.to_string(),
            "{\"message\":\"first\"}\n{\"field\":\"id\",\"isMissing\":true}"
        );
    }

    #[test]
    fn test_multi_error_flattens_nested() {
        let mut inner = MultiError::new();
        inner.push("a");
        inner.push("b");

        let mut outer = MultiError::new();
        outer.push(inner);
        outer.push(JsonResponse::error(400, ["c", "d"]));
        outer.push(std::io::Error::other("e"));

        let messages: Vec<_> = outer.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_bytes_input() {
        let mut out = Vec::new();
        ErrorInput::from(&b"raw bytes"[..]).append_to(&mut out);
        assert_eq!(out, vec![ApiError::new("raw bytes")]);
    }

    #[test]
    #[should_panic(expected = "unsupported error input: redirect response")]
    fn test_redirect_input_panics() {
        let mut me = MultiError::new();
        me.push(redirect("/", false));
    }

    #[test]
    #[should_panic(expected = "unsupported error input: break response")]
    fn test_break_input_panics() {
        let mut me = MultiError::new();
        me.push(BREAK);
    }
}
