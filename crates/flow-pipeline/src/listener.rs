use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};

use crate::flow::{Flow, FlowHook};

/// Hop-by-hop headers that must not be forwarded by a proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// `Via` entry this proxy adds to every forwarded request.
const VIA_MARKER: &str = "1.1 uid-gate";

/// Default bound on a single backend exchange.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a buffered request or response body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the proxy front end.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to bind proxy listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("request has neither an absolute URI nor a Host header")]
    MissingHost,

    #[error("request targets the proxy itself")]
    ForwardingLoop,

    #[error("invalid upstream URI: {0}")]
    InvalidTarget(#[from] http::uri::InvalidUri),

    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },

    #[error("upstream response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("failed to read body: {0}")]
    ReadBody(BoxError),

    #[error("upstream did not answer within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Configuration for the plain-HTTP proxy front end.
pub struct ProxyConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,
    /// Hook run on every proxied exchange.
    pub hook: Arc<dyn FlowHook>,
    /// Bound on one backend exchange, response body included.
    pub upstream_timeout: Duration,
    /// Largest request or response body buffered for the hook.
    pub max_body_bytes: usize,
}

impl ProxyConfig {
    /// Configuration with the default timeout and body cap.
    pub fn new(listen_addr: SocketAddr, hook: Arc<dyn FlowHook>) -> Self {
        Self {
            listen_addr,
            hook,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

struct ProxyState {
    hook: Arc<dyn FlowHook>,
    client: Client<HttpConnector, Full<Bytes>>,
    listen_addr: SocketAddr,
    upstream_timeout: Duration,
    max_body_bytes: usize,
}

/// A plain-HTTP forward proxy that drives a [`FlowHook`].
///
/// Each exchange is buffered into a [`Flow`], passed through
/// [`FlowHook::on_request`], forwarded, passed through
/// [`FlowHook::on_response`], and written back. `CONNECT` requests are
/// tunnelled byte-for-byte without inspection.
///
/// Requests addressed to the proxy's own listener, or already carrying its
/// `Via` marker, are refused with 400 instead of being forwarded.
pub struct Proxy {
    listen_addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            listen_addr: config.listen_addr,
            state: Arc::new(ProxyState {
                hook: config.hook,
                client,
                listen_addr: config.listen_addr,
                upstream_timeout: config.upstream_timeout,
                max_body_bytes: config.max_body_bytes,
            }),
        }
    }

    /// Bind to the configured address and serve forever.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: self.listen_addr,
                source,
            })?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on an already-bound listener, one Tokio task per
    /// connection.
    pub async fn serve(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "proxy listening");
        }

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::error!(%err, "failed to accept connection");
                    continue;
                }
            };
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(handle(&state, req, remote_addr).await) }
                });

                if let Err(err) = http1::Builder::new()
                    .preserve_header_case(true)
                    .title_case_headers(true)
                    .serve_connection(TokioIo::new(stream), service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!(%remote_addr, %err, "connection ended with error");
                }
            });
        }
    }
}

async fn handle(
    state: &ProxyState,
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    if req.method() == Method::CONNECT {
        return tunnel(req, remote_addr);
    }

    match forward(state, req).await {
        Ok(response) => response,
        Err(ProxyError::MissingHost) => {
            text_response(StatusCode::BAD_REQUEST, "request target has no host")
        }
        Err(ProxyError::ForwardingLoop) => {
            tracing::warn!(%remote_addr, "refusing request addressed to the proxy itself");
            text_response(StatusCode::BAD_REQUEST, "request targets the proxy itself")
        }
        Err(err @ ProxyError::RequestTooLarge { .. }) => {
            tracing::warn!(%remote_addr, %err, "request body rejected");
            text_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
        }
        Err(err) => {
            tracing::warn!(%remote_addr, %err, "failed to proxy request");
            text_response(StatusCode::BAD_GATEWAY, "upstream request failed")
        }
    }
}

/// Buffer, hook, forward, hook, reply.
async fn forward(
    state: &ProxyState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    let (mut parts, body) = req.into_parts();
    let target = target_uri(&parts.uri, &parts.headers)?;

    if carries_via_marker(&parts.headers) || targets_listener(&target, state.listen_addr) {
        return Err(ProxyError::ForwardingLoop);
    }

    let limit = state.max_body_bytes;
    let body = collect_limited(body, limit)
        .await
        .map_err(|err| body_error(err, ProxyError::RequestTooLarge { limit }))?;

    let path = target
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    let mut flow = Flow::new(parts.method.clone(), path, body);

    tracing::debug!(flow_id = %flow.id, method = %flow.method, uri = %target, "proxying request");

    state.hook.on_request(&mut flow).await;

    let is_head = parts.method == Method::HEAD;
    strip_framing_headers(&mut parts.headers, false);
    parts
        .headers
        .append(header::VIA, HeaderValue::from_static(VIA_MARKER));
    parts.uri = target;
    let upstream_req = Request::from_parts(parts, Full::new(flow.request_body.clone()));

    let exchange = async {
        let response = state.client.request(upstream_req).await?;
        let (parts, body) = response.into_parts();
        let body = collect_limited(body, limit)
            .await
            .map_err(|err| body_error(err, ProxyError::ResponseTooLarge { limit }))?;
        Ok::<_, ProxyError>((parts, body))
    };
    let (mut resp_parts, resp_body) = tokio::time::timeout(state.upstream_timeout, exchange)
        .await
        .map_err(|_| ProxyError::UpstreamTimeout(state.upstream_timeout))??;

    flow.set_response(resp_parts.status, resp_body);
    state.hook.on_response(&mut flow).await;

    let (status, body) = match flow.response {
        Some(response) => (response.status, response.body),
        None => (StatusCode::BAD_GATEWAY, Bytes::new()),
    };

    resp_parts.status = status;
    strip_framing_headers(&mut resp_parts.headers, is_head);
    Ok(Response::from_parts(resp_parts, Full::new(body)))
}

async fn collect_limited(body: Incoming, limit: usize) -> Result<Bytes, BoxError> {
    Ok(Limited::new(body, limit).collect().await?.to_bytes())
}

/// Map a body read failure, using `too_large` when the cap was hit.
fn body_error(err: BoxError, too_large: ProxyError) -> ProxyError {
    if err.is::<LengthLimitError>() {
        too_large
    } else {
        ProxyError::ReadBody(err)
    }
}

/// Answer a `CONNECT` with 200 and splice the upgraded connection to the
/// target. TLS traffic inside the tunnel is not inspected.
fn tunnel(req: Request<Incoming>, remote_addr: SocketAddr) -> Response<Full<Bytes>> {
    let Some(authority) = req.uri().authority().map(|a| a.to_string()) else {
        return text_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port");
    };

    tokio::spawn(async move {
        let upgraded = match hyper::upgrade::on(req).await {
            Ok(upgraded) => upgraded,
            Err(err) => {
                tracing::warn!(%remote_addr, %err, "CONNECT upgrade failed");
                return;
            }
        };

        let mut server = match TcpStream::connect(authority.as_str()).await {
            Ok(server) => server,
            Err(err) => {
                tracing::warn!(%remote_addr, dest = %authority, %err, "tunnel connect failed");
                return;
            }
        };

        let mut client = TokioIo::new(upgraded);
        match tokio::io::copy_bidirectional(&mut client, &mut server).await {
            Ok((up, down)) => {
                tracing::debug!(dest = %authority, up, down, "tunnel closed");
            }
            Err(err) => {
                tracing::debug!(dest = %authority, %err, "tunnel ended with error");
            }
        }
    });

    Response::new(Full::new(Bytes::new()))
}

/// Resolve the absolute URI to forward to: absolute-form request targets
/// are used as-is, origin-form targets are completed from the `Host` header.
fn target_uri(uri: &Uri, headers: &HeaderMap) -> Result<Uri, ProxyError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.clone());
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingHost)?;

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Ok(format!("http://{host}{path}").parse::<Uri>()?)
}

/// Whether `target` resolves to this proxy's own listening socket: same
/// port, and a host that is `localhost`, loopback, unspecified, or the
/// listen address itself.
fn targets_listener(target: &Uri, listen_addr: SocketAddr) -> bool {
    let Some(host) = target.host() else {
        return false;
    };
    if target.port_u16().unwrap_or(80) != listen_addr.port() {
        return false;
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => ip == listen_addr.ip() || ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}

/// Whether the request already passed through a proxy carrying our marker.
fn carries_via_marker(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::VIA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|entry| entry.trim().eq_ignore_ascii_case(VIA_MARKER))
}

/// Drop hop-by-hop headers (including any listed in `Connection`) plus the
/// framing headers that go stale when a hook replaces a body; hyper
/// recomputes `content-length` from the body. A HEAD response has no body
/// to recompute from, so its `content-length` is kept when
/// `keep_content_length` is set.
fn strip_framing_headers(headers: &mut HeaderMap, keep_content_length: bool) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }

    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    if !keep_content_length {
        headers.remove(header::CONTENT_LENGTH);
    }
    headers.remove(header::TRANSFER_ENCODING);
}

fn text_response(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
