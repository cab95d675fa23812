//! The standard structured response envelope.

use std::io::Read;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WriteToCtx;
use crate::core::{Context, Error, Result};
use crate::errors::{ApiError, ErrorInput, MultiError};

/// Standard API response: `{"code", "success", "data", "errors"}`.
///
/// `code` 0 means "not set": it becomes 400 when errors are present and 200
/// otherwise. `success` is always derived from the final code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,

    /// Emit tab-indented JSON.
    #[serde(skip)]
    pub indent: bool,
}

impl JsonResponse {
    /// A success response (code 200) carrying `data`.
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A success response with any serializable payload.
    pub fn try_new<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(data)?))
    }

    /// An error response.
    ///
    /// Every input is normalized into [`ApiError`]s; structured responses and
    /// [`MultiError`]s are spliced in. When nothing is supplied the status's
    /// canonical reason becomes the single error message.
    ///
    /// # Panics
    ///
    /// Panics if an input is a non-structured [`Response`](super::Response)
    /// (redirect, file, simple, break).
    pub fn error<I>(code: u16, inputs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ErrorInput>,
    {
        let mut errors = Vec::new();
        for input in inputs {
            input.into().append_to(&mut errors);
        }
        if errors.is_empty() {
            errors.push(ApiError::new(status_text(code)));
        }

        Self {
            code,
            errors,
            ..Self::default()
        }
    }

    /// An error response whose only message is the status's canonical reason.
    pub fn from_status(code: u16) -> Self {
        Self::error(code, std::iter::empty::<ErrorInput>())
    }

    /// Set the status code.
    #[inline]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Enable or disable indented output.
    #[inline]
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Whether the code is in `[200, 300)`. Only meaningful after the
    /// response was written or decoded.
    #[inline]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Decode `data` into a concrete type. Absent data decodes from `null`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.data.as_ref().unwrap_or(&Value::Null);
        Ok(T::deserialize(value)?)
    }

    /// Apply code defaulting and derive `success`.
    pub(crate) fn finalize(&mut self, default_code: u16) {
        if self.code == 0 {
            self.code = default_code;
        }
        self.success = (200..300).contains(&self.code);
    }

    pub(crate) fn default_code(&self) -> u16 {
        if self.errors.is_empty() {
            StatusCode::OK.as_u16()
        } else {
            StatusCode::BAD_REQUEST.as_u16()
        }
    }
}

impl WriteToCtx for JsonResponse {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.code == StatusCode::NO_CONTENT.as_u16() {
            ctx.write_header(self.code);
            return Ok(());
        }

        self.finalize(self.default_code());
        ctx.json(self.code, self.indent, &*self)
    }
}

/// Decode a [`JsonResponse`] from `reader`, closing it in every case.
///
/// A response with `success: false` becomes an error: [`Error::Api`] with its
/// error list, or [`Error::Status`] when the list is empty.
pub fn read_json_response<R: Read>(mut reader: R) -> Result<JsonResponse> {
    let decoded: serde_json::Result<JsonResponse> = serde_json::from_reader(&mut reader);
    drop(reader);

    let resp = decoded?;
    if resp.success {
        return Ok(resp);
    }

    match resp.errors.into_iter().collect::<MultiError>().err() {
        Some(me) => Err(Error::Api(me)),
        None => Err(Error::Status(resp.code)),
    }
}

/// Canonical reason phrase for a status code, empty if unknown.
pub(crate) fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
}
