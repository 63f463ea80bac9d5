use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per route template
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.extensions().get::<MatchedPath>(), req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Route template when the router matched, otherwise a fixed label so that
/// unknown paths cannot blow up label cardinality.
fn route_label(matched: Option<&MatchedPath>, raw_path: &str) -> String {
    match matched {
        Some(path) => path.as_str().to_string(),
        None if raw_path == "/health" || raw_path == "/metrics" => raw_path.to_string(),
        None => "unmatched".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_paths_collapse_to_one_label() {
        assert_eq!(route_label(None, "/api/v1/tasks/abc/complete"), "unmatched");
        assert_eq!(route_label(None, "/random/probe"), "unmatched");
        assert_eq!(route_label(None, "/health"), "/health");
    }
}
