//! The HTTP surface: widget embeds, status checks, forced refreshes, and diagnostics.
//!
//! | route                | method | auth         | answer                         |
//! |----------------------|--------|--------------|--------------------------------|
//! | `/widget`            | GET    | -            | widget HTML fragment           |
//! | `/ylvp/status`       | POST   | form `nonce` | [`StatusData`] envelope        |
//! | `/ylvp/refresh`      | POST   | form `nonce` | [`RefreshData`] envelope       |
//! | `/ylvp/debug`        | GET    | query `nonce`| [`DebugInfo`] JSON             |
//!
//! `debug=1` and `refresh=1` on `/widget` only take effect when the query also carries the
//! nonce; anonymous embeds always go through the cache.

use crate::Widget;
use crate::config::ServerConfig;
use crate::render::WidgetOptions;
use crate::status::{Envelope, RefreshData, UNAVAILABLE};
use crate::youtube_api::VideoPlatform;
use bytes::Bytes;
use eyre::Context;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

type Params<'a> = HashMap<Cow<'a, str>, Cow<'a, str>>;

fn params(raw: &[u8]) -> Params<'_> {
    form_urlencoded::parse(raw).collect()
}

fn respond(
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
) -> eyre::Result<Response<Full<Bytes>>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(body)))
        .context("build response")
}

fn json<T: Serialize>(status: StatusCode, payload: &T) -> eyre::Result<Response<Full<Bytes>>> {
    let body = serde_json::to_vec(payload).context("serialize response")?;
    respond(status, "application/json", body)
}

fn html(body: String) -> eyre::Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, "text/html; charset=utf-8", body.into_bytes())
}

/// Request handling, independent of the socket it came in on.
pub struct App<P> {
    widget: Arc<Widget<P>>,
    status_token: String,
    status_url: String,
}

impl<P: VideoPlatform> App<P> {
    pub fn new(widget: Arc<Widget<P>>, config: &ServerConfig) -> Self {
        Self {
            widget,
            status_token: config.status_token.clone(),
            status_url: format!("{}/ylvp/status", config.public_url.trim_end_matches('/')),
        }
    }

    fn authorized(&self, params: &Params<'_>) -> bool {
        params.get("nonce").is_some_and(|n| *n == self.status_token)
    }

    fn forbidden() -> eyre::Result<Response<Full<Bytes>>> {
        json(StatusCode::FORBIDDEN, &Envelope::failure("invalid nonce"))
    }

    /// Answers one request. Never fails; internal errors become a 500 failure envelope.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        match self.route(req).await {
            Ok(response) => {
                tracing::debug!(%method, %path, status = %response.status(), "served request");
                response
            }
            Err(e) => {
                tracing::warn!(%method, %path, error = %format!("{e:#}"), "request failed");
                let mut response = Response::new(Full::new(Bytes::from_static(
                    br#"{"success":false,"data":{"message":"internal error"}}"#,
                )));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }

    async fn route<B>(&self, req: Request<B>) -> eyre::Result<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => eyre::bail!("read request body: {e}"),
        };

        match (method, path.as_str()) {
            (Method::GET, "/widget") => {
                let mut options = WidgetOptions::from_query(&query);
                let authorized = self.authorized(&params(query.as_bytes()));
                options.debug &= authorized;
                options.refresh &= authorized;
                html(self.widget.render(&options, &self.status_url).await)
            }
            (Method::POST, "/ylvp/status") => {
                let form = params(&body);
                if !self.authorized(&form) {
                    return Self::forbidden();
                }
                let current = form.get("current_video_id").map(|id| id.as_ref());
                match self.widget.status(current).await {
                    Some(data) => json(StatusCode::OK, &Envelope::ok(data)),
                    None => json(StatusCode::OK, &Envelope::failure(UNAVAILABLE)),
                }
            }
            (Method::POST, "/ylvp/refresh") => {
                let form = params(&body);
                if !self.authorized(&form) {
                    return Self::forbidden();
                }
                let html = self.widget.refresh(&self.status_url).await;
                json(StatusCode::OK, &Envelope::ok(RefreshData { html }))
            }
            (Method::GET, "/ylvp/debug") => {
                if !self.authorized(&params(query.as_bytes())) {
                    return Self::forbidden();
                }
                json(StatusCode::OK, &self.widget.debug_info())
            }
            _ => respond(StatusCode::NOT_FOUND, "text/plain", b"not found".to_vec()),
        }
    }
}

/// Accepts connections on `listener` until the task is dropped, serving each on its own task.
pub async fn serve<P>(listener: TcpListener, app: Arc<App<P>>) -> eyre::Result<()>
where
    P: VideoPlatform + 'static,
{
    let addr = listener.local_addr().context("get local address")?;
    tracing::info!(%addr, "listening");
    loop {
        let (conn, peer) = listener.accept().await.context("accept")?;
        let conn = TokioIo::new(conn);
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let app = Arc::clone(&app);
                async move { Ok::<_, Infallible>(app.handle(req).await) }
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(conn, service)
                .await
            {
                tracing::debug!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}
