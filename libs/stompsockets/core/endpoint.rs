//! Endpoint URL handling
//!
//! Brokers are usually configured with the SockJS base URL
//! (`http://host:port/websocket`). SockJS servers expose a plain WebSocket
//! at `<base>/websocket`, which speaks unframed STOMP, so that is what the
//! client dials.

use crate::error::{Result, StompError};

/// SockJS raw WebSocket path suffix
pub const SOCKJS_RAW_SUFFIX: &str = "/websocket";

/// Turn a configured URL into the WebSocket URL to dial
pub fn resolve_ws_url(url: &str, sockjs: bool) -> Result<String> {
    let url = url.trim();
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| StompError::Configuration(format!("URL has no scheme: '{}'", url)))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(StompError::Configuration(format!(
                "unsupported URL scheme '{}'",
                other
            )))
        }
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(StompError::Configuration(format!("URL has no host: '{}'", url)));
    }

    let mut resolved = format!("{}://{}", ws_scheme, rest.trim_end_matches('/'));
    if sockjs {
        resolved.push_str(SOCKJS_RAW_SUFFIX);
    }
    Ok(resolved)
}

/// Host part of a URL, used for the CONNECT `host` header
pub fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;

    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next()?
    } else {
        authority.split(':').next()?
    };
    (!host.is_empty()).then_some(host)
}
