use std::path::PathBuf;

use super::{Response, WriteToCtx};
use crate::core::{Context, Result};

/// A file from disk, served with conditional GET and range support.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileResponse {
    /// Overrides the extension-based content type when non-empty.
    pub content_type: String,
    pub path: PathBuf,
}

/// Serve the file at `path`.
///
/// ```rust,ignore
/// return Some(file("text/html", "index.html"));
/// ```
pub fn file(content_type: impl Into<String>, path: impl Into<PathBuf>) -> Response {
    Response::File(FileResponse {
        content_type: content_type.into(),
        path: path.into(),
    })
}

impl WriteToCtx for FileResponse {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.set_content_type(&self.content_type);
        ctx.file(&self.path)
    }
}
