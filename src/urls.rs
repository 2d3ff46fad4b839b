//! Request-derived URLs: base resolution, path absolutization, client IPs.
//!
//! DESIGN
//! ======
//! - The base URL is computed once per request/connection and passed down as
//!   a plain string; nothing in here reads global state.
//! - Stored values are never rewritten; callers absolutize copies at
//!   read/broadcast time.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolve the public base URL for a request, without a trailing slash.
///
/// Order: configured override, then `x-forwarded-proto` / `x-forwarded-host`
/// (first element when comma-separated), then the `Host` header with plain
/// http.
#[must_use]
pub fn base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_owned();
    }

    let proto = header_first(headers, "x-forwarded-proto").unwrap_or_else(|| "http".to_owned());
    let host = header_first(headers, "x-forwarded-host")
        .or_else(|| header_first(headers, "host"))
        .unwrap_or_else(|| "localhost".to_owned());
    format!("{proto}://{host}")
}

/// Turn a storage-relative path into a fully qualified URL.
///
/// Absolute URLs and plain text pass through unchanged, so the function is
/// idempotent.
#[must_use]
pub fn absolutize(value: &str, base: &str) -> String {
    if is_absolute(value) {
        return value.to_owned();
    }
    if value.starts_with('/') {
        return format!("{base}{value}");
    }
    value.to_owned()
}

/// Best-effort client address: first `x-forwarded-for` hop, else the socket
/// peer, with the IPv4-mapped `::ffff:` prefix stripped.
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    let raw = header_first(headers, "x-forwarded-for").unwrap_or_else(|| remote.ip().to_string());
    let ip = raw.strip_prefix("::ffff:").unwrap_or(&raw);
    if ip.is_empty() {
        return "unknown".to_owned();
    }
    ip.to_owned()
}

fn is_absolute(value: &str) -> bool {
    value.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://"))
        || value.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("https://"))
}

fn header_first(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(first.to_owned())
}

#[cfg(test)]
#[path = "urls_test.rs"]
mod tests;
