use http::StatusCode;

use super::{Response, WriteToCtx};
use crate::core::{Context, Error, Result};

/// A redirect to `url` with `code`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    pub code: u16,
}

/// Redirect with `302 Found`, or `301 Moved Permanently` when `permanent`.
pub fn redirect(url: impl Into<String>, permanent: bool) -> Response {
    let code = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    redirect_with_code(url, code.as_u16())
}

/// Redirect with an explicit status code.
pub fn redirect_with_code(url: impl Into<String>, code: u16) -> Response {
    Response::Redirect(Redirect {
        url: url.into(),
        code,
    })
}

impl WriteToCtx for Redirect {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::InvalidUrl);
        }
        ctx.send_redirect(&self.url, self.code)
    }
}
