use serde_json::Value;

use super::json::JsonResponse;
use super::WriteToCtx;
use crate::core::{Context, Result};
use crate::errors::ErrorInput;

/// Callback used when none is supplied.
const DEFAULT_CALLBACK: &str = "console.error";

/// A [`JsonResponse`] wrapped in a script callback: `callback(<json>);`.
///
/// The transport status is always 200; the logical status travels in the
/// envelope's `code`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonpResponse {
    pub inner: JsonResponse,
    pub callback: String,
}

impl JsonpResponse {
    /// A success response (code 200) carrying `data`.
    pub fn new(callback: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            inner: JsonResponse::new(data),
            callback: callback.into(),
        }
    }

    /// An error response, see [`JsonResponse::error`].
    pub fn error<I>(callback: impl Into<String>, code: u16, inputs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ErrorInput>,
    {
        Self {
            inner: JsonResponse::error(code, inputs),
            callback: callback.into(),
        }
    }

    fn callback(&self) -> &str {
        if self.callback.is_empty() {
            DEFAULT_CALLBACK
        } else {
            &self.callback
        }
    }
}

impl WriteToCtx for JsonpResponse {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.inner.code == 204 {
            ctx.write_header(204);
            return Ok(());
        }

        let default_code = self.inner.default_code();
        self.inner.finalize(default_code);
        ctx.jsonp(200, self.callback(), &self.inner)
    }
}
