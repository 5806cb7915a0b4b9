//! Pure request routing over a registry: no I/O, no transport — just
//! `(method, path, query, body) -> (status, json body)`. The transport layer
//! in [`crate::server`] is a thin hyper shim over this.

use std::sync::Arc;

use appmetrics::registry::MetricKind;
use appmetrics::reservoir::ReservoirBuilder;
use appmetrics::{Registry, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// HTTP method, reduced to the five this surface recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Other,
}

/// A JSON-bodied HTTP response, transport-agnostic.
#[derive(Debug, PartialEq)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: Value,
}

impl DispatchResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self { status, body: Value::String(message.into()) }
    }
}

#[derive(Deserialize)]
struct CreateMetricRequest {
    #[serde(rename = "type")]
    kind: String,
    reservoir: Option<String>,
    size: Option<usize>,
    window_seconds: Option<u64>,
    alpha: Option<f64>,
    tick_interval_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct ObserveRequest {
    value: Option<f64>,
}

#[derive(Serialize)]
struct ObserveAck {
    observed: bool,
}

fn reservoir_builder_from(request: &CreateMetricRequest) -> Result<ReservoirBuilder, String> {
    let tag = request.reservoir.as_deref().unwrap_or("uniform");
    let size = request.size.unwrap_or(appmetrics::reservoir::DEFAULT_UNIFORM_RESERVOIR_SIZE);
    let window = Duration::from_secs(request.window_seconds.unwrap_or(60));
    let alpha = request.alpha.unwrap_or(appmetrics::reservoir::DEFAULT_EXPONENTIAL_DECAY_ALPHA);
    ReservoirBuilder::from_tag(tag, size, window, alpha).map_err(|e| e.to_string())
}

/// Routes one request against `registry`. `root` is the mount point (default
/// `/_app-metrics`); `path` must already have the root prefix stripped.
pub fn dispatch(
    registry: &Arc<Registry>,
    method: Method,
    path: &str,
    query: &str,
    body: Option<&[u8]>,
) -> DispatchResponse {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::Get, ["metrics"]) => DispatchResponse::ok(serde_json::json!(registry.names())),
        (Method::Get, ["metrics", name]) => match registry.snapshot(name) {
            Ok(snapshot) => DispatchResponse::ok(serde_json::to_value(snapshot).unwrap()),
            Err(RegistryError::Invalid { .. }) => DispatchResponse::error(404, "metric not found"),
            Err(e) => DispatchResponse::error(500, e.to_string()),
        },
        (Method::Put, ["metrics", name]) => put_metric(registry, name, body),
        (Method::Post, ["metrics", name]) => post_metric(registry, name, body),
        (Method::Delete, ["metrics", name]) => {
            let deleted = registry.delete_metric(name);
            DispatchResponse::ok(Value::String(
                if deleted { "deleted".to_string() } else { "not deleted".to_string() },
            ))
        }
        (Method::Get, ["tags"]) => DispatchResponse::ok(serde_json::json!(registry.tags())),
        (Method::Get, ["tags", tag]) => get_tag(registry, tag, query),
        (Method::Put, ["tags", tag, name]) => match registry.tag(name, tag) {
            Ok(()) => DispatchResponse::ok(Value::String("tagged".to_string())),
            Err(_) => DispatchResponse::error(400, "unknown metric"),
        },
        (Method::Delete, ["tags", tag, name]) => {
            let removed = registry.untag(name, tag);
            DispatchResponse::ok(Value::String(
                if removed { "deleted".to_string() } else { "not deleted".to_string() },
            ))
        }
        (Method::Other, _) => DispatchResponse::error(405, "method not allowed"),
        _ => DispatchResponse::error(404, "unknown resource"),
    }
}

fn put_metric(registry: &Registry, name: &str, body: Option<&[u8]>) -> DispatchResponse {
    let Some(body) = body else {
        return DispatchResponse::error(415, "expected a JSON body");
    };
    let request: CreateMetricRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return DispatchResponse::error(400, format!("invalid request body: {e}")),
    };

    let result = match request.kind.as_str() {
        "histogram" => match reservoir_builder_from(&request) {
            Ok(builder) => registry.new_metric(name, MetricKind::Histogram(builder)),
            Err(e) => return DispatchResponse::error(400, e),
        },
        "meter" => {
            let tick_interval = Duration::from_secs(request.tick_interval_seconds.unwrap_or(5));
            registry.new_metric(name, MetricKind::Meter(tick_interval))
        }
        "counter" => registry.new_metric(name, MetricKind::Counter),
        "gauge" => registry.new_metric(name, MetricKind::Gauge),
        other => return DispatchResponse::error(400, format!("unknown metric type: '{other}'")),
    };

    match result {
        Ok(_) => DispatchResponse::ok(Value::String("created".to_string())),
        Err(e) => DispatchResponse::error(400, e.to_string()),
    }
}

fn post_metric(registry: &Registry, name: &str, body: Option<&[u8]>) -> DispatchResponse {
    let Some(body) = body else {
        return DispatchResponse::error(415, "expected a JSON body");
    };
    let request: ObserveRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return DispatchResponse::error(400, format!("invalid request body: {e}")),
    };
    let Some(value) = request.value else {
        return DispatchResponse::error(400, "missing 'value' field");
    };

    match registry.observe(name, value) {
        Ok(observed) => DispatchResponse::ok(serde_json::to_value(ObserveAck { observed }).unwrap()),
        Err(RegistryError::Invalid { .. }) => DispatchResponse::error(404, "metric not found"),
        Err(e) => DispatchResponse::error(500, e.to_string()),
    }
}

fn get_tag(registry: &Registry, tag: &str, query: &str) -> DispatchResponse {
    let expand = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("expand="))
        .map(|v| v == "true")
        .unwrap_or(false);

    let Some(names) = registry.names_for_tag(tag) else {
        return DispatchResponse::error(404, "unknown tag");
    };

    if !expand {
        return DispatchResponse::ok(serde_json::json!(names));
    }

    let snapshots = registry.snapshot_by_tag(tag);
    DispatchResponse::ok(serde_json::to_value(snapshots).unwrap())
}
