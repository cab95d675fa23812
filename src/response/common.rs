//! Frequently used responses.

use super::json::JsonResponse;
use super::redirect::redirect;
use super::simple::{simple, Payload};
use super::Response;

/// JSON 405 with the canonical reason.
pub fn method_not_allowed() -> Response {
    JsonResponse::from_status(405).into()
}

/// JSON 404 with the canonical reason.
pub fn not_found() -> Response {
    JsonResponse::from_status(404).into()
}

/// JSON 403 with the canonical reason.
pub fn forbidden() -> Response {
    JsonResponse::from_status(403).into()
}

/// JSON 400 with the canonical reason.
pub fn bad_request() -> Response {
    JsonResponse::from_status(400).into()
}

/// JSON 200 with `"OK"` as data.
pub fn ok() -> Response {
    JsonResponse::new("OK").into()
}

/// Bare 204.
pub fn empty() -> Response {
    simple(204, "", Payload::Empty)
}

/// Bare 200.
pub fn plain_ok() -> Response {
    simple(200, "", Payload::Empty)
}

/// Temporary redirect to `/`.
pub fn redirect_root() -> Response {
    redirect("/", false)
}
