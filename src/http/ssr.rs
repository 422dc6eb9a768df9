//! Server-side rendering seam.
//!
//! The page renderer is an external collaborator behind [`Renderer`]. The
//! gateway only hands it the request context and turns the result into a
//! response. [`ShellRenderer`] is the default: it emits the HTML document
//! the client bundle boots into.

use std::collections::BTreeMap;
use std::path::Path;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use futures_util::future::{self, BoxFuture};
use serde::Deserialize;
use thiserror::Error;

use crate::config::BundleConfig;
use crate::http::request::{Nonce, RequestCookies};

/// Everything a renderer may look at for one request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub cookies: RequestCookies,
    pub nonce: Nonce,
}

/// A rendered HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: StatusCode,
    pub html: String,
}

impl RenderedPage {
    pub fn ok(html: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            html: html.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Produces the HTML document for unmatched GET requests.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, request: RenderRequest) -> BoxFuture<'_, Result<RenderedPage, RenderError>>;
}

/// Per-chunk entry of the webpack asset manifest.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChunkAssets {
    pub js: Option<String>,
    pub css: Option<String>,
}

/// `assets.json` written next to the client bundle, keyed by chunk name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AssetManifest(pub BTreeMap<String, ChunkAssets>);

impl AssetManifest {
    /// Read the manifest. Returns `None` when the file is absent or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read asset manifest");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed asset manifest");
                None
            }
        }
    }

    /// Chunks in load order: everything else first, `index` last.
    fn ordered(&self) -> impl Iterator<Item = &ChunkAssets> {
        let others = self.0.iter().filter(|(name, _)| *name != "index").map(|(_, c)| c);
        others.chain(self.0.get("index"))
    }
}

/// Default renderer emitting the application shell.
#[derive(Debug, Clone)]
pub struct ShellRenderer {
    scripts: Vec<String>,
    styles: Vec<String>,
}

impl ShellRenderer {
    /// Build from the bundle config, reading its asset manifest once.
    pub fn from_bundle(bundle: &BundleConfig) -> Self {
        let manifest = AssetManifest::load(&bundle.manifest_path());
        if manifest.is_none() {
            tracing::info!(
                http_path = %bundle.http_path,
                "No asset manifest, shell will load index.js from the bundle path"
            );
        }
        Self::new(manifest, &bundle.http_path)
    }

    pub fn new(manifest: Option<AssetManifest>, bundle_http_path: &str) -> Self {
        match manifest {
            Some(manifest) => Self {
                scripts: manifest.ordered().filter_map(|c| c.js.clone()).collect(),
                styles: manifest.ordered().filter_map(|c| c.css.clone()).collect(),
            },
            None => Self {
                scripts: vec![format!("{}/index.js", bundle_http_path.trim_end_matches('/'))],
                styles: Vec::new(),
            },
        }
    }

    pub fn document(&self, request: &RenderRequest) -> String {
        let nonce = escape_attr(request.nonce.as_str());
        let state = serde_json::json!({ "path": request.uri.path() })
            .to_string()
            .replace('<', "\\u003c");

        let mut html = String::with_capacity(512);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        for href in &self.styles {
            html.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_attr(href)));
        }
        html.push_str("</head>\n<body>\n<div id=\"app\"></div>\n");
        html.push_str(&format!(
            "<script nonce=\"{nonce}\">window.__APP_STATE__={state};</script>\n"
        ));
        for src in &self.scripts {
            html.push_str(&format!(
                "<script nonce=\"{nonce}\" src=\"{}\" defer></script>\n",
                escape_attr(src)
            ));
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

impl Renderer for ShellRenderer {
    fn render(&self, request: RenderRequest) -> BoxFuture<'_, Result<RenderedPage, RenderError>> {
        Box::pin(future::ready(Ok(RenderedPage::ok(self.document(&request)))))
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
