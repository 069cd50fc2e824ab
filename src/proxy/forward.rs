//! Request forwarding to the primary listener.
//!
//! # Responsibilities
//! - Capture an inbound request as a [`ForwardRequest`]
//! - Rewrite it for the primary (URI, hop-by-hop headers, Content-Type)
//! - Stream the body upstream and relay status + body back
//!
//! # Design Decisions
//! - One pooled client shared by every auxiliary listener
//! - Bodies are never buffered in either direction
//! - The upstream timeout bounds the wait for response headers and every
//!   gap between body frames afterwards

use axum::{
    body::Body,
    http::{
        header::{self, HeaderName},
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri,
    },
    response::IntoResponse,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tower_http::timeout::TimeoutBody;

use crate::config::{ContentTypePolicy, TimeoutConfig};

/// Pooled HTTP client used for the upstream leg.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Headers that only make sense for a single hop.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Failure on the upstream leg.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream {target} unavailable: {source}")]
    Unavailable {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
    #[error("upstream {target} did not respond within {timeout:?}")]
    Timeout { target: String, timeout: Duration },
    #[error("invalid upstream target '{target}'")]
    InvalidTarget { target: String },
}

impl ForwardError {
    pub fn target(&self) -> &str {
        match self {
            ForwardError::Unavailable { target, .. }
            | ForwardError::Timeout { target, .. }
            | ForwardError::InvalidTarget { target } => target,
        }
    }
}

/// Build the shared upstream client.
pub fn build_client(timeouts: &TimeoutConfig) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
        .build(connector)
}

/// An inbound request captured at an auxiliary listener.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub content_length: Option<u64>,
    pub peer: Option<SocketAddr>,
}

impl ForwardRequest {
    pub fn from_request(request: Request<Body>, peer: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        let content_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().filter(|q| !q.is_empty()).map(str::to_string),
            headers: parts.headers,
            body,
            content_length,
            peer,
        }
    }

    /// Path plus `?query` when a non-empty query was sent.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Only a positive `Content-Length` carries a body upstream.
    pub fn has_body(&self) -> bool {
        matches!(self.content_length, Some(n) if n > 0)
    }
}

/// What came back from the primary: status, body and the relayed header subset.
#[derive(Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Incoming,
    /// Longest pause tolerated between body frames before the relay is cut.
    pub idle_timeout: Duration,
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> axum::response::Response {
        let body = TimeoutBody::new(self.idle_timeout, self.body);
        let mut response = Response::new(Body::new(body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Forwards captured requests to the primary listener.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    upstream: Authority,
    timeout: Duration,
    content_type: ContentTypePolicy,
}

impl Forwarder {
    pub fn new(
        client: UpstreamClient,
        upstream_host: &str,
        upstream_port: u16,
        timeout: Duration,
        content_type: ContentTypePolicy,
    ) -> Result<Self, ForwardError> {
        let authority = match upstream_host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, upstream_port),
            _ => format!("{}:{}", upstream_host, upstream_port),
        };
        let upstream = Authority::try_from(authority.as_str())
            .map_err(|_| ForwardError::InvalidTarget { target: authority })?;

        Ok(Self {
            client,
            upstream,
            timeout,
            content_type,
        })
    }

    /// `http://host:port` of the primary.
    pub fn target_base_url(&self) -> String {
        format!("http://{}", self.upstream)
    }

    /// Absolute URI on the primary for `path_and_query`.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, ForwardError> {
        let invalid = || ForwardError::InvalidTarget {
            target: format!("{}{}", self.target_base_url(), path_and_query),
        };
        let path_and_query = PathAndQuery::try_from(path_and_query).map_err(|_| invalid())?;

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.upstream.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|_| invalid())
    }

    /// Send `request` to the primary and wait for its response head.
    ///
    /// The returned body inherits the same timeout, applied per frame.
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ForwardError> {
        let uri = self.target_uri(&request.path_and_query())?;
        let target = uri.to_string();
        let outbound = self.build_outbound(request, uri);

        let response = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| ForwardError::Timeout {
                target: target.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ForwardError::Unavailable {
                target: target.clone(),
                source,
            })?;

        let (parts, body) = response.into_parts();
        Ok(ForwardResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body,
            idle_timeout: self.timeout,
        })
    }

    fn build_outbound(&self, request: ForwardRequest, uri: Uri) -> Request<Body> {
        let has_body = request.has_body();
        let ForwardRequest {
            method,
            mut headers,
            body,
            peer,
            ..
        } = request;

        strip_hop_by_hop(&mut headers);
        let original_host = headers.remove(header::HOST);
        append_forwarded(&mut headers, peer, original_host);

        if self.content_type == ContentTypePolicy::ForceJson {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        let body = if has_body {
            body
        } else {
            headers.remove(header::CONTENT_LENGTH);
            Body::empty()
        };

        let mut outbound = Request::new(body);
        *outbound.method_mut() = method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;
        outbound
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

fn append_forwarded(headers: &mut HeaderMap, peer: Option<SocketAddr>, host: Option<HeaderValue>) {
    if let Some(peer) = peer {
        let forwarded_for = match headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{}, {}", existing, peer.ip()),
            None => peer.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert("x-forwarded-for", value);
        }
    }
    if let Some(host) = host {
        headers.insert("x-forwarded-host", host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(policy: ContentTypePolicy) -> Forwarder {
        let client = build_client(&TimeoutConfig::default());
        Forwarder::new(client, "127.0.0.1", 8080, Duration::from_secs(5), policy).unwrap()
    }

    fn capture(request: Request<Body>) -> ForwardRequest {
        ForwardRequest::from_request(request, Some("10.0.0.7:5123".parse().unwrap()))
    }

    #[test]
    fn captures_path_query_and_length() {
        let request = Request::post("/recipes?term=soup&page=2")
            .header(header::CONTENT_LENGTH, "17")
            .body(Body::from("{\"name\":\"stew\"}xx"))
            .unwrap();

        let captured = capture(request);
        assert_eq!(captured.method, Method::POST);
        assert_eq!(captured.path, "/recipes");
        assert_eq!(captured.query.as_deref(), Some("term=soup&page=2"));
        assert_eq!(captured.content_length, Some(17));
        assert!(captured.has_body());
        assert_eq!(captured.path_and_query(), "/recipes?term=soup&page=2");
    }

    #[test]
    fn empty_query_is_dropped() {
        let captured = capture(Request::get("/recipes?").body(Body::empty()).unwrap());
        assert_eq!(captured.query, None);
        assert_eq!(captured.path_and_query(), "/recipes");
        assert!(!captured.has_body());
    }

    #[test]
    fn target_uri_points_at_primary() {
        let f = forwarder(ContentTypePolicy::ForceJson);
        assert_eq!(f.target_base_url(), "http://127.0.0.1:8080");
        assert_eq!(
            f.target_uri("/recipes?term=soup").unwrap().to_string(),
            "http://127.0.0.1:8080/recipes?term=soup"
        );
    }

    #[test]
    fn ipv6_upstream_is_bracketed() {
        let client = build_client(&TimeoutConfig::default());
        let f = Forwarder::new(client, "::1", 8080, Duration::from_secs(1), ContentTypePolicy::Preserve)
            .unwrap();
        assert_eq!(f.target_base_url(), "http://[::1]:8080");
    }

    #[test]
    fn invalid_upstream_host_is_rejected() {
        let client = build_client(&TimeoutConfig::default());
        let err = Forwarder::new(client, "bad host", 8080, Duration::from_secs(1), ContentTypePolicy::Preserve)
            .unwrap_err();
        assert!(matches!(err, ForwardError::InvalidTarget { .. }));
    }

    #[test]
    fn outbound_forces_json_and_strips_hop_headers() {
        let f = forwarder(ContentTypePolicy::ForceJson);
        let request = Request::post("/recipes")
            .header(header::HOST, "localhost:8081")
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::CONTENT_LENGTH, "2")
            .header(header::CONNECTION, "keep-alive, x-secret-hop")
            .header("x-secret-hop", "1")
            .header(header::AUTHORIZATION, "Bearer abc")
            .body(Body::from("{}"))
            .unwrap();
        let captured = capture(request);
        let uri = f.target_uri(&captured.path_and_query()).unwrap();

        let outbound = f.build_outbound(captured, uri);
        let headers = outbound.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(headers[header::CONTENT_LENGTH], "2");
        assert_eq!(headers["x-forwarded-for"], "10.0.0.7");
        assert_eq!(headers["x-forwarded-host"], "localhost:8081");
        assert!(!headers.contains_key(header::HOST));
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key("x-secret-hop"));
        assert_eq!(outbound.uri().to_string(), "http://127.0.0.1:8080/recipes");
    }

    #[test]
    fn preserve_policy_keeps_content_type() {
        let f = forwarder(ContentTypePolicy::Preserve);
        let request = Request::put("/recipes/1")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::empty())
            .unwrap();
        let captured = capture(request);
        let uri = f.target_uri(&captured.path_and_query()).unwrap();

        let outbound = f.build_outbound(captured, uri);
        assert_eq!(outbound.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(outbound.method(), Method::PUT);
    }

    #[test]
    fn zero_length_sends_empty_body() {
        let f = forwarder(ContentTypePolicy::ForceJson);
        let request = Request::delete("/recipes/1")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap();
        let captured = capture(request);
        let uri = f.target_uri(&captured.path_and_query()).unwrap();

        let outbound = f.build_outbound(captured, uri);
        assert!(!outbound.headers().contains_key(header::CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = build_client(&TimeoutConfig::default());
        let f = Forwarder::new(client, "127.0.0.1", port, Duration::from_secs(5), ContentTypePolicy::ForceJson)
            .unwrap();
        let err = f
            .forward(capture(Request::get("/recipes").body(Body::empty()).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Unavailable { .. }));
        assert_eq!(err.target(), format!("http://127.0.0.1:{}/recipes", port));
    }
}
