//! HTTP surface: a small hyper server exposing the generator.
//!
//! Routes:
//!
//! - `GET /` serves the generator page.
//! - `GET /health` answers `{"status":"ok"}`.
//! - `POST /generate` takes a `multipart/form-data` body with the fields
//!   `data`, `watermark` (file), `position`, `transparency`, `scale`,
//!   `qr_size` and `error_correction`, and answers with `image/png` or a
//!   JSON `{"error": ...}` body.
//!
//! Every response allows any origin, and `OPTIONS` preflights are answered
//! for all paths.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::engine;
use crate::error::Error;
use crate::form::{self, FormEvent, FormState, Watermark};
use crate::placement::{MAX_SCALE_PERCENT, MIN_SCALE_PERCENT};
use crate::raster;

/// Pause after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Runtime settings for the HTTP surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Upper bound on reading, generating and encoding one request.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

type Rejection = (StatusCode, String);

/// Raised when the request future is dropped, so blocking work started for
/// it can stop early.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Accept connections until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    info!(address = %listener.local_addr()?, "listening");
    let config = Arc::new(config);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        };

        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let config = Arc::clone(&config);
                async move { Ok::<_, Infallible>(handle(req, &config).await) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}

/// Route one request.
pub async fn handle<B>(req: Request<B>, config: &ServerConfig) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let mut resp = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight(),
        (&Method::GET, "/") => html(form::render_page(&FormState::default())),
        (&Method::GET, "/health") => json(StatusCode::OK, &serde_json::json!({ "status": "ok" })),
        (&Method::POST, "/generate") => generate(req, config).await,
        (_, "/" | "/health" | "/generate") => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    resp.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    info!(%method, path = %path, status = resp.status().as_u16(), "request");
    resp
}

async fn generate<B>(req: Request<B>, config: &ServerConfig) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let work = generate_png(req, config.max_body_bytes);
    match tokio::time::timeout(config.request_timeout, work).await {
        Ok(Ok(png)) => {
            let mut resp = Response::new(Full::new(Bytes::from(png)));
            resp.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            resp
        }
        Ok(Err((status, message))) => json_error(status, &message),
        Err(_) => json_error(StatusCode::GATEWAY_TIMEOUT, "request timed out"),
    }
}

async fn generate_png<B>(req: Request<B>, max_body_bytes: usize) -> Result<Vec<u8>, Rejection>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let state = read_form(req, max_body_bytes).await?.apply(FormEvent::Submit);
    if let Some(message) = &state.error {
        return Err((StatusCode::BAD_REQUEST, message.clone()));
    }
    let opts = state.options().map_err(|e| reject(&e))?;
    let data = state.data;
    let watermark = state.watermark.map(|w| w.bytes);

    let cancelled = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancelled));

    let png = tokio::task::spawn_blocking(move || -> crate::Result<Option<Vec<u8>>> {
        let watermark = watermark
            .as_deref()
            .map(raster::decode_watermark)
            .transpose()?;
        if cancelled.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let img = engine::generate(&data, watermark.as_ref(), &opts)?;
        if cancelled.load(Ordering::Relaxed) {
            return Ok(None);
        }
        raster::encode_png(&img).map(Some)
    })
    .await
    .map_err(|e| {
        warn!(error = %e, "generation task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to generate QR code".to_string(),
        )
    })?;

    match png {
        Ok(Some(png)) => Ok(png),
        Ok(None) => Err((
            StatusCode::GATEWAY_TIMEOUT,
            "request timed out".to_string(),
        )),
        Err(e) => {
            warn!(error = %e, "failed to generate QR code");
            Err(reject(&e))
        }
    }
}

/// Read a multipart body and fold its fields into a form state.
async fn read_form<B>(req: Request<B>, max_body_bytes: usize) -> Result<FormState, Rejection>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let boundary = multer::parse_boundary(&content_type).map_err(|_| {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected a multipart/form-data body".to_string(),
        )
    })?;

    let body = match Limited::new(req.into_body(), max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("request body exceeds {max_body_bytes} bytes"),
            ));
        }
        Err(e) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
            ));
        }
    };

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut state = FormState::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "watermark" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().map(ToString::to_string);
            let bytes = field.bytes().await.map_err(malformed)?;
            // Browsers send an empty part when no file was chosen
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            state = state.apply(FormEvent::SetWatermark(Watermark {
                name: file_name,
                content_type,
                bytes: bytes.to_vec(),
            }));
            if let Some(message) = &state.error {
                return Err((StatusCode::BAD_REQUEST, message.clone()));
            }
            continue;
        }

        let value = field.text().await.map_err(malformed)?;
        if let Some(event) = field_event(&name, value.trim()).map_err(|e| reject(&e))? {
            state = state.apply(event);
        }
    }

    Ok(state)
}

/// Translate one text field into a form event. Unknown fields are ignored.
fn field_event(name: &str, value: &str) -> crate::Result<Option<FormEvent>> {
    let event = match name {
        "data" => FormEvent::SetData(value.to_owned()),
        "position" if !value.is_empty() => FormEvent::SetPosition(value.parse()?),
        "transparency" if !value.is_empty() => {
            let transparency = parse_number(name, value)?;
            if transparency > u32::from(u8::MAX) {
                return Err(Error::invalid(format!(
                    "transparency must be between 0 and 255, got {transparency}"
                )));
            }
            FormEvent::SetTransparency(transparency)
        }
        "scale" if !value.is_empty() => {
            let scale = parse_scale(value)?;
            if !(MIN_SCALE_PERCENT..=MAX_SCALE_PERCENT).contains(&scale) {
                return Err(Error::invalid(format!(
                    "scale must be between {MIN_SCALE_PERCENT} and {MAX_SCALE_PERCENT} percent, got {scale}"
                )));
            }
            FormEvent::SetScale(scale)
        }
        "qr_size" | "qrSize" if !value.is_empty() => {
            FormEvent::SetQrSize(parse_number(name, value)?)
        }
        "error_correction" if !value.is_empty() => {
            FormEvent::SetErrorCorrection(value.parse()?)
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn parse_number(name: &str, value: &str) -> crate::Result<u32> {
    value
        .parse()
        .map_err(|_| Error::invalid(format!("{name} must be a whole number, got '{value}'")))
}

/// Parse a scale given either as a percentage (`25`) or a fraction (`0.25`).
fn parse_scale(value: &str) -> crate::Result<u32> {
    let scale: f64 = value
        .parse()
        .map_err(|_| Error::invalid(format!("scale must be a number, got '{value}'")))?;
    if !scale.is_finite() || scale < 0.0 || scale > f64::from(u32::MAX) {
        return Err(Error::invalid(format!("scale out of range: {value}")));
    }
    let percent = if scale < 1.0 {
        (scale * 100.0).round()
    } else {
        scale.floor()
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(percent as u32)
}

fn malformed(e: multer::Error) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        format!("malformed multipart body: {e}"),
    )
}

fn reject(e: &Error) -> Rejection {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}

fn preflight() -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NO_CONTENT;
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    resp
}

fn html(page: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(page)));
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    resp
}

fn json(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json(status, &serde_json::json!({ "error": message }))
}
