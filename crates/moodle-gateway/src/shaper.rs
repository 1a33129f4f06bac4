//! Response shaping: structured (JSON) and readable (indented text) output,
//! both bounded by a byte limit.
//!
//! Rendering is a pure function of its inputs, so the same result always
//! renders to the same bytes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::call::UpstreamResult;
use crate::error::{ErrorKind, GatewayError};

/// Fields Moodle reports as unix timestamps.
const TIMESTAMP_FIELDS: &[&str] = &[
    "startdate",
    "enddate",
    "timestart",
    "timecreated",
    "timemodified",
    "timeaccess",
    "lastaccess",
    "firstaccess",
    "duedate",
    "cutoffdate",
    "gradingduedate",
    "allowsubmissionsfromdate",
    "timeopen",
    "timeclose",
    "dateissued",
    "dateexpire",
    "timeread",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEncoding {
    /// Pretty JSON, order-preserving
    Structured,
    /// Titled, indented text
    #[default]
    Readable,
}

impl FromStr for ResponseEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "structured" => Ok(ResponseEncoding::Structured),
            "markdown" | "md" | "readable" | "text" => Ok(ResponseEncoding::Readable),
            other => Err(format!(
                "unknown output format '{other}' (expected json or markdown)"
            )),
        }
    }
}

impl fmt::Display for ResponseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseEncoding::Structured => f.write_str("structured"),
            ResponseEncoding::Readable => f.write_str("readable"),
        }
    }
}

/// Final output handed back to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedResponse {
    pub encoding: ResponseEncoding,
    pub body: String,
    pub truncated: bool,
    /// Body is a failure diagnostic rather than a payload
    pub failed: bool,
}

/// Render `result` under `title`, never exceeding `max_bytes`.
pub fn render(
    result: &UpstreamResult,
    title: &str,
    encoding: ResponseEncoding,
    max_bytes: usize,
) -> RenderedResponse {
    let mut rendered = match (result, encoding) {
        (UpstreamResult::Success { payload }, ResponseEncoding::Structured) => {
            fit_structured(payload, max_bytes)
        }
        (UpstreamResult::Success { payload }, ResponseEncoding::Readable) => {
            fit_readable(render_readable(payload, title), max_bytes)
        }
        (UpstreamResult::Failure(err), ResponseEncoding::Structured) => {
            fit_structured(&failure_json(err), max_bytes)
        }
        (UpstreamResult::Failure(err), ResponseEncoding::Readable) => {
            fit_readable(render_failure(err, title), max_bytes)
        }
    };
    rendered.failed = matches!(result, UpstreamResult::Failure(_));
    rendered
}

/// One-line diagnostic for a failure, e.g. for attributing a fan-out item.
pub fn describe_failure(err: &GatewayError) -> String {
    match &err.debug_info {
        Some(debug) => format!("{}: {} [debug: {}]", err.kind.label(), err.message, debug),
        None => format!("{}: {}", err.kind.label(), err.message),
    }
}

fn hint(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::WriteBlocked => {
            "The local write policy blocked this call before anything was sent to the backend."
        }
        ErrorKind::AuthError => {
            "Check that the token for the active environment is valid and has not expired."
        }
        ErrorKind::PermissionDenied => {
            "The backend raised an access exception. This can mean a missing capability or a \
             function that is not enabled in the service definition for this token; the debug \
             info above is the backend's own wording."
        }
        ErrorKind::InvalidParameter => "The backend rejected a parameter name or value.",
        ErrorKind::NetworkError => "The backend could not be reached in time; the call may be retried.",
        ErrorKind::UpstreamUnknown => "Unrecognized backend error, reported verbatim.",
    }
}

fn render_failure(err: &GatewayError, title: &str) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        out.push_str(&format!("# {title}\n\n"));
    }
    out.push_str(&format!("{}: {}\n", err.kind.label(), err.message));
    if let Some(debug) = &err.debug_info {
        out.push_str(&format!("Debug info: {debug}\n"));
    }
    out.push_str(hint(err.kind));
    out.push('\n');
    out
}

fn failure_json(err: &GatewayError) -> Value {
    json!({
        "error": {
            "kind": err.kind.as_str(),
            "message": err.message,
            "debuginfo": err.debug_info,
            "hint": hint(err.kind),
        }
    })
}

// ============================================================================
// Readable encoding
// ============================================================================

/// Generic recursive text rendering: lists become numbered entries, maps
/// become `- key: value` lines with nested indentation.
pub fn render_readable(payload: &Value, title: &str) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        out.push_str(&format!("# {title}\n\n"));
    }
    match payload {
        Value::Array(items) => {
            out.push_str(&format!("Total items: {}\n\n", items.len()));
            if items.is_empty() {
                out.push_str("No items found.\n");
            } else {
                write_array(items, 0, &mut out);
            }
        }
        Value::Object(map) if map.is_empty() => out.push_str("No data.\n"),
        Value::Object(map) => write_object(map, 0, &mut out),
        scalar => {
            out.push_str(&scalar_text(None, scalar, 0));
            out.push('\n');
        }
    }
    out
}

fn write_object(map: &Map<String, Value>, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    for (key, value) in map {
        match value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            Value::Array(items) if items.is_empty() => {
                out.push_str(&format!("{pad}- {key}: (none)\n"));
            }
            Value::Object(inner) if inner.is_empty() => {
                out.push_str(&format!("{pad}- {key}: (none)\n"));
            }
            Value::Array(items) => {
                out.push_str(&format!("{pad}- {key}:\n"));
                write_array(items, depth + 1, out);
            }
            Value::Object(inner) => {
                out.push_str(&format!("{pad}- {key}:\n"));
                write_object(inner, depth + 1, out);
            }
            scalar => {
                let text = scalar_text(Some(key), scalar, depth);
                out.push_str(&format!("{pad}- {key}: {text}\n"));
            }
        }
    }
}

fn write_array(items: &[Value], depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        match item {
            Value::Array(inner) if !inner.is_empty() => {
                out.push_str(&format!("{pad}{n}.\n"));
                write_array(inner, depth + 1, out);
            }
            Value::Object(inner) if !inner.is_empty() => {
                out.push_str(&format!("{pad}{n}.\n"));
                write_object(inner, depth + 1, out);
            }
            Value::Array(_) | Value::Object(_) => out.push_str(&format!("{pad}{n}. (empty)\n")),
            scalar => {
                let text = scalar_text(None, scalar, depth);
                out.push_str(&format!("{pad}{n}. {text}\n"));
            }
        }
    }
}

fn scalar_text(key: Option<&str>, value: &Value, depth: usize) -> String {
    match value {
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::Null => "null".to_string(),
        Value::Number(n) => match (key, n.as_i64()) {
            (Some(key), Some(ts)) if ts > 0 && TIMESTAMP_FIELDS.contains(&key) => {
                match DateTime::<Utc>::from_timestamp(ts, 0) {
                    Some(dt) => format!("{} ({ts})", dt.format("%Y-%m-%d %H:%M:%S UTC")),
                    None => n.to_string(),
                }
            }
            _ => n.to_string(),
        },
        Value::String(s) => {
            let continuation = format!("\n{}  ", "  ".repeat(depth));
            s.lines().collect::<Vec<_>>().join(&continuation)
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn fit_readable(body: String, max_bytes: usize) -> RenderedResponse {
    if body.len() <= max_bytes {
        return RenderedResponse {
            encoding: ResponseEncoding::Readable,
            body,
            truncated: false,
            failed: false,
        };
    }

    let notice = format!(
        "\n\n[Response truncated: {} bytes exceeded the {} byte limit. \
         Narrow the request with offset/limit or filters.]",
        body.len(),
        max_bytes
    );
    let (budget, notice) = if notice.len() < max_bytes {
        (max_bytes - notice.len(), notice)
    } else {
        (max_bytes, String::new())
    };

    let mut cut = floor_char_boundary(&body, budget);
    if let Some(newline) = body[..cut].rfind('\n') {
        if newline >= cut / 2 {
            cut = newline;
        }
    }

    let mut truncated = body[..cut].to_string();
    truncated.push_str(&notice);
    RenderedResponse {
        encoding: ResponseEncoding::Readable,
        body: truncated,
        truncated: true,
        failed: false,
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

// ============================================================================
// Structured encoding
// ============================================================================

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Serialize `value`; when too large, keep the largest prefix of items,
/// fields or characters that still serializes within the bound so the body
/// stays valid JSON. The first field that does not fit is shrunk in turn, so
/// `{"users": [...], "warnings": []}` keeps a prefix of `users`.
fn fit_structured(value: &Value, max_bytes: usize) -> RenderedResponse {
    let full = to_pretty(value);
    if full.len() <= max_bytes {
        return RenderedResponse {
            encoding: ResponseEncoding::Structured,
            body: full,
            truncated: false,
            failed: false,
        };
    }

    let fits = |candidate: &Value| to_pretty(candidate).len() <= max_bytes;
    RenderedResponse {
        encoding: ResponseEncoding::Structured,
        body: shrink_json(value, &fits)
            .map(|shrunk| to_pretty(&shrunk))
            .unwrap_or_default(),
        truncated: true,
        failed: false,
    }
}

/// Shrink `value` so that `fits` accepts it. `fits` judges the whole document
/// with the candidate in place of `value`. `None` when not even an empty
/// container fits.
fn shrink_json(value: &Value, fits: &dyn Fn(&Value) -> bool) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let prefix = |k: usize| Value::Array(items[..k].to_vec());
            let k = largest_fitting(items.len(), |k| fits(&prefix(k)))?;
            let mut kept = items[..k].to_vec();
            // Items are kept whole unless the first one alone is too large.
            if k == 0 {
                if let Some(first) = items.first() {
                    let inner = |candidate: &Value| fits(&Value::Array(vec![candidate.clone()]));
                    if let Some(partial) = shrink_json(first, &inner) {
                        kept.push(partial);
                    }
                }
            }
            Some(Value::Array(kept))
        }
        Value::Object(map) => {
            let prefix = |k: usize| -> Map<String, Value> {
                map.iter()
                    .take(k)
                    .map(|(key, v)| (key.clone(), v.clone()))
                    .collect()
            };
            let k = largest_fitting(map.len(), |k| fits(&Value::Object(prefix(k))))?;
            let mut kept = prefix(k);
            if let Some((key, next)) = map.iter().nth(k) {
                let inner = |candidate: &Value| {
                    let mut with_next = kept.clone();
                    with_next.insert(key.clone(), candidate.clone());
                    fits(&Value::Object(with_next))
                };
                if let Some(partial) = shrink_json(next, &inner) {
                    kept.insert(key.clone(), partial);
                }
            }
            Some(Value::Object(kept))
        }
        Value::String(s) => {
            let boundaries: Vec<usize> = s
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(s.len()))
                .collect();
            let prefix = |k: usize| Value::String(s[..boundaries[k]].to_string());
            let k = largest_fitting(boundaries.len() - 1, |k| fits(&prefix(k)))?;
            Some(prefix(k))
        }
        _ => fits(value).then(|| value.clone()),
    }
}

/// Largest `k` in `0..=n` with `fits(k)`, assuming `fits` is monotone
/// (true up to some point, false after). `None` when even 0 does not fit.
fn largest_fitting(n: usize, fits: impl Fn(usize) -> bool) -> Option<usize> {
    if !fits(0) {
        return None;
    }
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Some(lo)
}
