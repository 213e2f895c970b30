//! Reverse proxy to device backends
//!
//! A request to `/device/<id>/<rest>` is validated against the registry and
//! forwarded once to `http://<host>/<rest>`. Method, headers and body pass
//! through unchanged apart from hop-by-hop headers and `Host`; the backend's
//! response is streamed back as-is. There is no retry.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;
use url::Url;

use crate::registry::{Device, DeviceRegistry};
use crate::{Error, Result};

/// Path prefix under which devices are addressed
pub const DEVICE_PATH_PREFIX: &str = "/device/";

/// Headers that describe a single connection and are never forwarded
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Split a raw request path into its device id and the remainder after it
///
/// `/device/1000a1b2c3/zeroconf/switch` yields `("1000a1b2c3", "/zeroconf/switch")`.
/// The remainder keeps its leading slash and is `/` when nothing follows the id.
#[must_use]
pub fn split_device_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(DEVICE_PATH_PREFIX)?;
    let (id, remainder) = rest.find('/').map_or((rest, "/"), |i| rest.split_at(i));
    if id.is_empty() {
        return None;
    }
    Some((id, remainder))
}

/// Remove hop-by-hop headers, including any named by `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Base URL for a device host; backends are always plain HTTP
///
/// # Errors
///
/// Returns [`Error::InvalidHost`] if `host` isn't a bare `host[:port]`
/// authority. A path, query or fragment is rejected rather than overwritten.
pub fn backend_base(host: &str) -> Result<Url> {
    let url = Url::parse(&format!("http://{host}"))
        .map_err(|e| Error::InvalidHost(format!("{host}: {e}")))?;
    let bare = url.path() == "/" && url.query().is_none() && url.fragment().is_none();
    if url.host_str().is_none_or(str::is_empty) || !bare || host.contains(['/', '?', '#']) {
        return Err(Error::InvalidHost(host.to_string()));
    }
    Ok(url)
}

/// Destination URL: the device base with its path replaced by `remainder`
#[must_use]
pub fn forward_url(base: &Url, remainder: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    url.set_path(remainder);
    url.set_query(query);
    url
}

/// Forwards device requests to their backends
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: DeviceRegistry,
    client: reqwest::Client,
}

impl Dispatcher {
    /// Create a dispatcher with an explicit HTTP client
    #[must_use]
    pub const fn new(registry: DeviceRegistry, client: reqwest::Client) -> Self {
        Self { registry, client }
    }

    /// Create a dispatcher with its own HTTP client
    ///
    /// `backend_timeout` bounds the whole forwarded exchange; without it the
    /// call is bounded only by the caller's connection.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn build(registry: DeviceRegistry, backend_timeout: Option<Duration>) -> Result<Self> {
        // redirects are relayed to the caller, not followed
        let redirects = reqwest::redirect::Policy::none();
        let mut builder = reqwest::Client::builder().redirect(redirects);
        if let Some(timeout) = backend_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(registry, builder.build()?))
    }

    /// The registry this dispatcher resolves against
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Resolve `id` to a device that may receive forwarded requests
    ///
    /// # Errors
    ///
    /// Returns the registry read error, [`Error::NotFound`] for an unknown id
    /// or empty host, or [`Error::Disabled`]
    pub async fn routable_device(&self, id: &str) -> Result<Device> {
        let device = self
            .registry
            .resolve(id)
            .await?
            .filter(Device::is_routable)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if !device.enabled {
            return Err(Error::Disabled(id.to_string()));
        }
        Ok(device)
    }

    /// Forward `request` to the backend of device `id`, replacing its path
    /// with `remainder`
    ///
    /// The request body is streamed to the backend without buffering, so its
    /// size is bounded only by the caller. The backend call lives inside this
    /// future and the returned body, so a caller disconnect drops it.
    ///
    /// # Errors
    ///
    /// Returns any [`Dispatcher::routable_device`] error, [`Error::InvalidHost`],
    /// or [`Error::Backend`] when the backend can't be reached
    pub async fn dispatch(&self, id: &str, request: Request, remainder: &str) -> Result<Response> {
        let device = self.routable_device(id).await?;
        let base = backend_base(&device.host)?;

        let (parts, body) = request.into_parts();
        let url = forward_url(&base, remainder, parts.uri.query());

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        tracing::debug!(device_id = %id, method = %parts.method, url = %url, "forwarding request");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    device_id = %id,
                    host = %device.host,
                    error = %e,
                    "backend request failed"
                );
                Error::Backend(e.to_string())
            })?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        tracing::debug!(device_id = %id, status = %status, "relaying backend response");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
