//! Static file roots.
//!
//! # Responsibilities
//! - Serve the compiled client bundle under its configured mount
//! - Serve the public directory at the HTTP root
//! - Serve the service worker script at `/sw.js`
//!
//! # Design Decisions
//! - A missing file is not an error: the request falls through to the
//!   next pipeline stage
//! - Only GET and HEAD are served; other methods fall through
//! - Cache-Control is only set on roots configured with a max-age

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, request::Parts, HeaderValue, Method, Request, StatusCode, Uri},
    response::Response,
    BoxError,
};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::http::response::AppError;

/// A directory mounted under an HTTP path prefix.
#[derive(Debug, Clone)]
pub struct StaticRoot {
    mount: String,
    dir: PathBuf,
    service: ServeDir,
    cache_control: Option<HeaderValue>,
}

impl StaticRoot {
    /// Mount `dir` at `mount` (`/` for the root).
    pub fn new(mount: &str, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            mount: mount.trim_end_matches('/').to_string(),
            service: ServeDir::new(&dir),
            dir,
            cache_control: None,
        }
    }

    /// Advertise `max_age` on every file served from this root.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        let value = format!("public, max-age={}", max_age.as_secs());
        self.cache_control = HeaderValue::from_str(&value).ok();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mount(&self) -> &str {
        if self.mount.is_empty() {
            "/"
        } else {
            &self.mount
        }
    }

    /// Path relative to the mount, or `None` if the request is outside it.
    fn strip_mount<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.mount.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.mount.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Put the mount back in front of a redirect the file service built
    /// from the stripped path (`/fonts` → `/client/fonts/`).
    fn remount_location(&self, response: &mut Response) {
        if self.mount.is_empty() {
            return;
        }
        let Some(location) = response.headers().get(header::LOCATION) else {
            return;
        };
        let Some(relative) = location.to_str().ok().filter(|l| l.starts_with('/')) else {
            return;
        };
        match HeaderValue::try_from(format!("{}{}", self.mount, relative)) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(e) => tracing::warn!(error = %e, "Could not rebuild redirect location"),
        }
    }

    /// Serve the request from this root, or `None` to fall through.
    pub async fn try_serve(&self, request: &Parts) -> Option<Response> {
        if !is_read(&request.method) {
            return None;
        }
        let path = self.strip_mount(request.uri.path())?;
        let path_and_query = match request.uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        let uri = Uri::try_from(path_and_query).ok()?;

        let response = serve_via(self.service.clone(), request, uri).await;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => None,
            status => {
                let mut response = response;
                if status.is_redirection() {
                    self.remount_location(&mut response);
                }
                if let Some(value) = &self.cache_control {
                    if status.is_success() || status == StatusCode::NOT_MODIFIED {
                        response.headers_mut().insert(header::CACHE_CONTROL, value.clone());
                    }
                }
                Some(response)
            }
        }
    }
}

/// The service worker script, served from the HTTP root.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    path: PathBuf,
}

impl ServiceWorker {
    pub const ROUTE: &'static str = "/sw.js";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn matches(&self, request: &Parts) -> bool {
        is_read(&request.method) && request.uri.path() == Self::ROUTE
    }

    /// Send the script. A missing file is an error, not a fall-through.
    pub async fn serve(&self, request: &Parts) -> Result<Response, AppError> {
        let response = serve_via(ServeFile::new(&self.path), request, request.uri.clone()).await;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::ServiceWorkerMissing(self.path.display().to_string()));
        }
        Ok(response)
    }
}

fn is_read(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Run a file service against a body-less request built from `request` at `uri`.
async fn serve_via<S, B>(service: S, request: &Parts, uri: Uri) -> Response
where
    S: tower::Service<Request<Body>, Response = axum::http::Response<B>, Error = std::convert::Infallible>,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let mut builder = Request::builder().method(request.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers.clone());
    }
    let file_request = match builder.body(Body::empty()) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build static file request");
            return crate::http::response::not_found();
        }
    };

    match service.oneshot(file_request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
