//! Terminal responders and response bookkeeping.
//!
//! # Responsibilities
//! - Fixed plain-text 404 for requests nothing claimed
//! - Fixed plain-text 500 for handler errors and panics
//! - Tag responses with the stage that produced them
//!
//! # Design Decisions
//! - Error details go to the log, never to the response body
//! - The 500 path is reachable from `AppError` and from caught panics

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::ssr::RenderError;

pub const NOT_FOUND_BODY: &str = "Sorry, that resource was not found.";
pub const INTERNAL_ERROR_BODY: &str = "Sorry, an unexpected error occurred.";

/// Response extension naming the stage that produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandledBy(pub &'static str);

/// Attach a [`HandledBy`] tag.
pub fn tag(mut response: Response, stage: &'static str) -> Response {
    response.extensions_mut().insert(HandledBy(stage));
    response
}

/// Errors raised by request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("service worker script not found at {0}")]
    ServiceWorkerMissing(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(&self);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        tracing::error!(error = %self, caused_by = ?chain, "Request failed");
        internal_error()
    }
}

/// Terminal handler for unclaimed requests.
pub fn not_found() -> Response {
    tag((StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(), "not_found")
}

/// Terminal handler for failed requests.
pub fn internal_error() -> Response {
    tag(
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response(),
        "error",
    )
}

/// Panic responder for `CatchPanicLayer`.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %message, "Handler panicked");
    internal_error()
}
