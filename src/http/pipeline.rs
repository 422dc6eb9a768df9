//! Ordered dispatch for requests the API proxy did not claim.
//!
//! # Data Flow
//! ```text
//! unclaimed request
//!     → client bundle root (GET/HEAD under the bundle mount)
//!     → public root        (GET/HEAD)
//!     → service worker     (GET/HEAD /sw.js, production only)
//!     → renderer           (GET/HEAD)
//!     → 404
//! ```
//!
//! # Design Decisions
//! - Stages are fixed when the pipeline is built; order never changes
//! - First stage to produce a response wins, later stages never run
//! - Production-only stages are left out of the list, not skipped at runtime

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{request::Parts, Method, Request},
    response::{IntoResponse, Response},
};

use crate::config::ServerConfig;
use crate::http::request::{Nonce, RequestContextExt};
use crate::http::response::{not_found, tag, AppError};
use crate::http::server::AppState;
use crate::http::ssr::{RenderRequest, Renderer};
use crate::http::static_files::{ServiceWorker, StaticRoot};

/// One step of the dispatch pipeline.
pub enum Stage {
    ClientBundle(StaticRoot),
    PublicFiles(StaticRoot),
    ServiceWorker(ServiceWorker),
    Render(Arc<dyn Renderer>),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ClientBundle(_) => "client_bundle",
            Stage::PublicFiles(_) => "public",
            Stage::ServiceWorker(_) => "service_worker",
            Stage::Render(_) => "ssr",
        }
    }

    /// Produce a response, or `None` to let the next stage try.
    async fn run(&self, request: &Parts) -> Result<Option<Response>, AppError> {
        match self {
            Stage::ClientBundle(root) | Stage::PublicFiles(root) => Ok(root.try_serve(request).await),
            Stage::ServiceWorker(worker) => {
                if worker.matches(request) {
                    worker.serve(request).await.map(Some)
                } else {
                    Ok(None)
                }
            }
            Stage::Render(renderer) => {
                if request.method != Method::GET && request.method != Method::HEAD {
                    return Ok(None);
                }
                let render_request = RenderRequest {
                    method: request.method.clone(),
                    uri: request.uri.clone(),
                    headers: request.headers.clone(),
                    cookies: request.cookies().cloned().unwrap_or_default(),
                    nonce: request.nonce().cloned().unwrap_or_else(Nonce::generate),
                };
                let page = renderer.render(render_request).await?;
                let response = (
                    page.status,
                    [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    page.html,
                )
                    .into_response();
                Ok(Some(response))
            }
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ClientBundle(root) | Stage::PublicFiles(root) => f
                .debug_struct(self.name())
                .field("mount", &root.mount())
                .field("dir", &root.dir())
                .finish(),
            Stage::ServiceWorker(worker) => f.debug_tuple(self.name()).field(worker).finish(),
            Stage::Render(_) => f.write_str(self.name()),
        }
    }
}

/// Immutable list of stages.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Build the standard stage list for `config`.
    pub fn from_config(config: &ServerConfig, renderer: Arc<dyn Renderer>) -> Self {
        let mut stages = vec![
            Stage::ClientBundle(
                StaticRoot::new(&config.bundle.http_path, &config.bundle.client_dir)
                    .with_max_age(config.bundle.cache_max_age),
            ),
            Stage::PublicFiles(StaticRoot::new("/", &config.public_dir)),
        ];
        if config.mode.is_production() {
            stages.push(Stage::ServiceWorker(ServiceWorker::new(
                config.bundle.service_worker_path(),
            )));
        }
        stages.push(Stage::Render(renderer));

        let pipeline = Self::new(stages);
        tracing::info!(stages = ?pipeline.stage_names(), "Dispatch pipeline built");
        pipeline
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run stages in order until one responds; 404 if none does.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, AppError> {
        let (parts, _) = request.into_parts();
        for stage in &self.stages {
            if let Some(response) = stage.run(&parts).await? {
                tracing::debug!(stage = stage.name(), path = %parts.uri.path(), "Request handled");
                return Ok(tag(response, stage.name()));
            }
        }
        tracing::debug!(method = %parts.method, path = %parts.uri.path(), "No stage matched");
        Ok(not_found())
    }
}

/// Router fallback handing unclaimed requests to the pipeline.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Result<Response, AppError> {
    state.pipeline.dispatch(request).await
}
