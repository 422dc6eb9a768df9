//! HTTP parameter pollution guard.
//!
//! A repeated query key (`?sort=asc&sort=desc`) is collapsed to its last
//! value before routing. The request as the client sent it is kept in a
//! [`PollutedQuery`] extension: the API proxy forwards that raw URI, so only
//! local handlers see the collapsed query.

use axum::{
    extract::Request,
    http::{uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};
use url::form_urlencoded;

/// Dropped values, by key, in their original order.
pub type DroppedValues = Vec<(String, Vec<String>)>;

/// Left on a request whose query had repeated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollutedQuery {
    /// URI before the query was collapsed.
    pub original: Uri,
    pub dropped: DroppedValues,
}

impl PollutedQuery {
    /// The URI the client sent, whether or not its query was collapsed.
    pub fn original_uri<'a>(extensions: &'a axum::http::Extensions, current: &'a Uri) -> &'a Uri {
        extensions
            .get::<PollutedQuery>()
            .map_or(current, |polluted| &polluted.original)
    }
}

/// Collapse repeated keys so each one keeps only its last value.
///
/// Returns `None` when the query has no repeated keys.
pub fn dedupe_query(query: &str) -> Option<(String, DroppedValues)> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut kept: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    let mut dropped: DroppedValues = Vec::new();

    for (key, value) in pairs {
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                let previous = std::mem::replace(existing, value);
                match dropped.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, values)) => values.push(previous),
                    None => dropped.push((key, vec![previous])),
                }
            }
            None => kept.push((key, value)),
        }
    }

    if dropped.is_empty() {
        return None;
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept.iter())
        .finish();
    Some((query, dropped))
}

fn with_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// Middleware rewriting polluted query strings.
pub async fn guard_parameter_pollution(mut request: Request, next: Next) -> Response {
    let deduped = request.uri().query().and_then(dedupe_query);

    if let Some((query, dropped)) = deduped {
        match with_query(request.uri(), &query) {
            Some(uri) => {
                tracing::debug!(
                    path = %request.uri().path(),
                    keys = dropped.len(),
                    "Collapsed repeated query parameters"
                );
                let original = std::mem::replace(request.uri_mut(), uri);
                request
                    .extensions_mut()
                    .insert(PollutedQuery { original, dropped });
            }
            None => {
                tracing::warn!(path = %request.uri().path(), "Could not rebuild deduplicated query");
            }
        }
    }

    next.run(request).await
}
