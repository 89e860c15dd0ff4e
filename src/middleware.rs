/* src/middleware.rs */

use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

use crate::addr::ClientIp;
use crate::strategy::Strategy;

/// Extension that holds the derived client IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealIp(pub ClientIp);

impl RealIp {
    /// Get the client IP.
    pub fn ip(&self) -> &ClientIp {
        &self.0
    }
}

/// Layer that derives the client IP of each request with a [`Strategy`].
///
/// The strategy sees the request headers and the peer address from
/// `ConnectInfo<SocketAddr>`, so serve the app with
/// `into_make_service_with_connect_info::<SocketAddr>()` when the strategy needs it. On
/// success a [`RealIp`] extension is inserted; on failure the request passes through
/// without one.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use real_client_ip::{RealIp, RealIpLayer, RemoteAddr, RightmostNonPrivate, Strategy};
///
/// async fn handler(real_ip: RealIp) -> String {
///     real_ip.ip().to_string()
/// }
///
/// let strategy = Strategy::chain([
///     RightmostNonPrivate::new("X-Forwarded-For").unwrap().into(),
///     RemoteAddr.into(),
/// ]);
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(RealIpLayer::new(strategy));
/// ```
#[derive(Debug, Clone)]
pub struct RealIpLayer {
    strategy: Arc<Strategy>,
}

impl RealIpLayer {
    /// Create a layer that uses `strategy` for every request.
    pub fn new(strategy: impl Into<Strategy>) -> Self {
        Self {
            strategy: Arc::new(strategy.into()),
        }
    }
}

impl<S> Layer<S> for RealIpLayer {
    type Service = RealIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RealIpService {
            inner,
            strategy: Arc::clone(&self.strategy),
        }
    }
}

/// Service that derives client IP addresses.
#[derive(Debug, Clone)]
pub struct RealIpService<S> {
    inner: S,
    strategy: Arc<Strategy>,
}

impl<S> Service<Request> for RealIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // An empty peer address is simply unusable, which only matters to strategies
        // that read it.
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|connect_info| connect_info.0.to_string())
            .unwrap_or_default();

        match self.strategy.client_ip(req.headers(), &remote_addr) {
            Some(ip) => {
                req.extensions_mut().insert(RealIp(ip));
            }
            None => {
                debug!(
                    strategy = %self.strategy,
                    remote_addr = %remote_addr,
                    "could not derive client IP"
                );
            }
        }

        let future = self.inner.call(req);
        Box::pin(future)
    }
}

/// Rejection used when a handler requires [`RealIp`] but none was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRealIp;

impl IntoResponse for MissingRealIp {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "client IP could not be determined",
        )
            .into_response()
    }
}

/// Axum extractor for the client IP.
///
/// Requires [`RealIpLayer`]. Rejects with `500 Internal Server Error` when the strategy
/// found no address, since that means the strategy does not match the deployment. Use
/// `Option<RealIp>` to handle that case in the handler instead.
impl<S> FromRequestParts<S> for RealIp
where
    S: Send + Sync,
{
    type Rejection = MissingRealIp;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RealIp>()
            .cloned()
            .ok_or(MissingRealIp)
    }
}

impl<S> OptionalFromRequestParts<S> for RealIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<RealIp>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{RemoteAddr, RightmostNonPrivate, SingleIpHeader};
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    async fn required(real_ip: RealIp) -> String {
        real_ip.ip().to_string()
    }

    async fn optional(real_ip: Option<RealIp>) -> String {
        real_ip.map_or_else(|| "none".to_string(), |ip| ip.ip().to_string())
    }

    fn app(strategy: impl Into<Strategy>) -> Router {
        Router::new()
            .route("/", get(required))
            .route("/optional", get(optional))
            .layer(RealIpLayer::new(strategy))
    }

    async fn send(
        app: Router,
        uri: &str,
        headers: &[(&str, &str)],
        peer: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }

        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_layer_uses_repeated_headers_in_order() {
        let strategy = RightmostNonPrivate::new("X-Forwarded-For").unwrap();
        let (status, body) = send(
            app(strategy),
            "/",
            &[
                ("X-Forwarded-For", "1.1.1.1, 2.2.2.2"),
                ("X-Forwarded-For", "3.3.3.3, 192.168.1.1"),
            ],
            Some("192.168.1.2:40000"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "3.3.3.3");
    }

    #[tokio::test]
    async fn test_layer_falls_back_to_peer() {
        let strategy = Strategy::chain([
            SingleIpHeader::new("Cf-Connecting-IP").unwrap().into(),
            RemoteAddr.into(),
        ]);
        let (status, body) = send(app(strategy), "/", &[], Some("[2001:4860::1]:443")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "2001:4860::1");
    }

    #[tokio::test]
    async fn test_missing_ip_rejects_or_is_optional() {
        let (status, _) = send(app(RemoteAddr), "/", &[], None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(app(RemoteAddr), "/optional", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "none");
    }
}
