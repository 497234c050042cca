use axum::http::HeaderMap;
use url::Url;

pub const CALLBACK_PATH: &str = "/api/callback/generation";

/// Providers only deliver webhooks over TLS, so the scheme is forced to https
/// whatever the configured base or the proxy headers say.
pub fn build_callback_url(
    public_base_url: Option<&str>,
    headers: &HeaderMap,
) -> Result<String, String> {
    let base = match public_base_url.map(str::trim).filter(|v| !v.is_empty()) {
        Some(configured) => configured.to_string(),
        None => request_host(headers)
            .map(|host| format!("https://{host}"))
            .ok_or_else(|| "no public base url configured and request has no host".to_string())?,
    };
    let base = if base.contains("://") {
        base
    } else {
        format!("https://{base}")
    };

    let mut url = Url::parse(&base).map_err(|e| format!("invalid callback base url: {e}"))?;
    if url.scheme() != "https" {
        url.set_scheme("https")
            .map_err(|_| format!("cannot force https on callback base `{base}`"))?;
    }
    if url.port() == Some(80) {
        let _ = url.set_port(None);
    }
    url.set_path(CALLBACK_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

fn request_host(headers: &HeaderMap) -> Option<String> {
    ["x-forwarded-host", "host"].iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
    })
}
