//! Shared HTTP plumbing: client construction, response checks, SSRF guard.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Response};
use url::Url;

use newsroom_shared::{NewsroomError, Result};

/// User-Agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("newsroom/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed.
const MAX_REDIRECTS: usize = 5;

/// Longest error body echoed back in messages.
const ERROR_BODY_CHARS: usize = 300;

/// Build a reqwest client with a request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| NewsroomError::Network(format!("failed to build HTTP client: {e}")))
}

/// Return the response if it is 2xx, otherwise a message with status and body excerpt.
pub(crate) async fn check_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt = newsroom_markdown::truncate_chars(body.trim(), ERROR_BODY_CHARS);
    if excerpt.is_empty() {
        Err(format!("HTTP {status}"))
    } else {
        Err(format!("HTTP {status}: {excerpt}"))
    }
}

/// Join an API base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a non-public resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
