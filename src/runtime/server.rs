//! The bridge server: host-facing HTTP endpoint, invocation chain and
//! process lifecycle.

use crate::envelope::{InvokeRequest, InvokeResponse, TriggerRequest};
use crate::function::{Endpoint, HandlerError, HttpHandler, RouteTable};
use crate::http::{FunctionRequest, Method, ResponseRecorder, StatusCode, SynthesisError};
use crate::logging::{FunctionLogger, LogCapture};
use crate::report::{CrashEvent, CrashReport};
use crate::runtime::context::{CancelGuard, ContextError, InvocationContext};
use crate::runtime::render::render_error_page;
use crate::runtime::BridgeConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The connecting request as seen on the host side of the bridge.
///
/// Handlers can retrieve it through the invocation context; the crash
/// reporter uses it to identify what was being served.
#[derive(Debug, Clone)]
pub struct HostRequest {
    /// Outer HTTP method, `POST` for every real host invocation.
    pub method: String,
    /// Outer request path, `/<functionName>`.
    pub path: String,
    /// Outer request headers.
    pub headers: HashMap<String, String>,
    /// Peer address, absent when the exchange never touched a socket.
    pub remote_addr: Option<SocketAddr>,
}

impl HostRequest {
    /// Create a host request with the given outer method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            remote_addr: None,
        }
    }

    /// Create a POST host request, the shape the host actually sends.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }
}

/// The bridge's answer on the host side of the exchange.
#[derive(Debug)]
pub struct HostResponse {
    /// Outer status code. 200 whenever an envelope was produced; the
    /// invocation's real status travels inside the envelope.
    pub status: StatusCode,
    /// Outer response headers.
    pub headers: HashMap<String, String>,
    /// Outer response body.
    pub body: Bytes,
}

/// Invocation bridge server.
///
/// Translates host invocation envelopes into synthetic requests for
/// registered handlers and serializes the recorded outcome back into
/// the envelope the host expects.
pub struct BridgeServer {
    /// Server configuration.
    config: BridgeConfig,
    /// Registered endpoints by function name.
    routes: RouteTable,
    /// Crash-reporting collaborator for unclassified failures.
    reporter: Arc<dyn CrashReport>,
    /// Contents of the version file, read at startup in deployed mode.
    version: Option<String>,
}

impl BridgeServer {
    /// Create a new bridge server.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            reporter: crate::report::from_env(),
            version: None,
        }
    }

    /// Create a new bridge server with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(BridgeConfig::default())
    }

    /// Replace the crash reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn CrashReport>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a handler for a GET function. The accepted-method check
    /// runs against the synthesized method, and GET registration also
    /// accepts HEAD.
    pub fn register_get(&mut self, name: impl Into<String>, handler: impl HttpHandler + 'static) {
        self.routes
            .register(name, vec![Method::Get, Method::Head], Arc::new(handler));
    }

    /// Register a handler for a POST function.
    pub fn register_post(&mut self, name: impl Into<String>, handler: impl HttpHandler + 'static) {
        self.routes
            .register(name, vec![Method::Post], Arc::new(handler));
    }

    /// Perform one complete host exchange without a socket: outer
    /// routing, the invocation chain and envelope encoding.
    ///
    /// `serve` feeds this from real connections; tests and host
    /// simulators call it directly.
    pub async fn dispatch(&self, host: HostRequest, body: Bytes) -> HostResponse {
        if body.len() > self.config.max_body_size {
            return plain_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                StatusCode::PAYLOAD_TOO_LARGE.reason(),
            );
        }

        let name = host.path.trim_start_matches('/');
        if name.is_empty() || name.contains('/') {
            return plain_response(StatusCode::NOT_FOUND, StatusCode::NOT_FOUND.reason());
        }
        let Some(endpoint) = self.routes.lookup(name) else {
            return plain_response(StatusCode::NOT_FOUND, StatusCode::NOT_FOUND.reason());
        };
        // The host always posts envelopes; anything else never carries
        // an invocation.
        if host.method != "POST" {
            return plain_response(
                StatusCode::METHOD_NOT_ALLOWED,
                StatusCode::METHOD_NOT_ALLOWED.reason(),
            );
        }

        let name = name.to_string();
        self.invoke(&name, endpoint, Arc::new(host), body).await
    }

    /// Run the invocation chain for one envelope: decode, synthesize,
    /// execute, classify, encode.
    async fn invoke(
        &self,
        name: &str,
        endpoint: &Endpoint,
        host: Arc<HostRequest>,
        body: Bytes,
    ) -> HostResponse {
        let mut recorder = ResponseRecorder::new();
        let (logger, capture) =
            FunctionLogger::create(self.config.log_level, name, self.config.environment);

        let input = match InvokeRequest::decode(&body) {
            Ok(input) => input,
            Err(err) => {
                recorder.plain_error(StatusCode::INTERNAL_SERVER_ERROR);
                logger
                    .with_field("error", error_chain(&err))
                    .error("Cannot decode JSON request");
                return emit_response(recorder, capture);
            }
        };
        let raw = match input.trigger_payload() {
            Ok(raw) => raw,
            Err(_) => {
                recorder.plain_error(StatusCode::INTERNAL_SERVER_ERROR);
                logger.error("Missing req parameter");
                return emit_response(recorder, capture);
            }
        };

        logger.with_field("req", raw.get()).trace("Internal request received");

        let trigger = match TriggerRequest::from_raw(raw) {
            Ok(trigger) => trigger,
            Err(err) => {
                recorder.plain_error(StatusCode::INTERNAL_SERVER_ERROR);
                logger
                    .with_field("error", error_chain(&err))
                    .error("Cannot decode HTTP request");
                return emit_response(recorder, capture);
            }
        };

        let ctx = Arc::new(
            InvocationContext::new(Instant::now() + self.config.invocation_deadline)
                .with_host_request(host.clone())
                .with_logger(logger.clone()),
        );
        // Abandoning this future mid-flight cancels the handler's
        // context so detached work can stop cooperatively.
        let _guard = CancelGuard::new(ctx.clone());

        let request = match FunctionRequest::synthesize(trigger, &endpoint.methods) {
            Ok(request) => request,
            Err(err @ SynthesisError::InvalidMethod(_)) => {
                recorder.plain_error(StatusCode::INTERNAL_SERVER_ERROR);
                logger
                    .with_field("error", error_chain(&err))
                    .error("Cannot create internal HTTP request");
                return emit_response(recorder, capture);
            }
            Err(SynthesisError::MethodNotAllowed(_)) => {
                recorder.plain_error(StatusCode::METHOD_NOT_ALLOWED);
                return emit_response(recorder, capture);
            }
        };

        let (mut recorder, result) =
            execute(endpoint.handler.clone(), recorder, request, ctx.clone()).await;
        if let Err(err) = result {
            self.classify(&mut recorder, err, &ctx, &logger, name, &host);
        }
        emit_response(recorder, capture)
    }

    /// Map a handler failure to its terminal response.
    fn classify(
        &self,
        recorder: &mut ResponseRecorder,
        err: HandlerError,
        ctx: &InvocationContext,
        logger: &FunctionLogger,
        name: &str,
        host: &HostRequest,
    ) {
        // Structured errors are honored for the statuses a client can
        // legitimately be told about; everything else is treated as an
        // internal failure below.
        if let HandlerError::Http(http_err) = &err {
            if matches!(http_err.status.0, 404 | 401 | 400) {
                logger
                    .with_field("error", error_chain(&err))
                    .with_field("status", http_err.status.reason())
                    .with_field("reason", http_err.reason.as_str())
                    .error("Handler failed");
                render_error_page(recorder, http_err.status);
                return;
            }
        }

        if ctx.err() == Some(ContextError::Canceled) {
            render_error_page(recorder, StatusCode::REQUEST_TIMEOUT);
            return;
        }

        let chain = error_chain(&err);
        logger.with_field("error", chain.clone()).error("Handler failed");
        self.reporter.report(CrashEvent {
            function: name.to_string(),
            method: host.method.clone(),
            path: host.path.clone(),
            message: chain.clone(),
        });

        if ctx.err() == Some(ContextError::DeadlineExceeded) {
            render_error_page(recorder, StatusCode::REQUEST_TIMEOUT);
            return;
        }

        if self.config.environment.is_local() {
            recorder.reset();
            recorder.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            recorder.write_str(&chain);
            recorder.write_str("\n");
        } else {
            render_error_page(recorder, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    /// Start serving and block until a termination signal arrives.
    ///
    /// A bind failure, an unreadable version file, or a non-closing
    /// accept error terminates the process: a broken listener means the
    /// host cannot dispatch work at all.
    pub async fn serve(mut self) {
        if !self.config.environment.is_local() {
            match tokio::fs::read_to_string(&self.config.version_file).await {
                Ok(version) => self.version = Some(version.trim().to_string()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    error!(
                        error = %err,
                        file = %self.config.version_file.display(),
                        "cannot read version file"
                    );
                    std::process::exit(1);
                }
            }
        }

        if self.reporter.enabled() {
            info!("Crash reporting enabled");
        }

        let addr = self.config.bind_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(error = %err, addr = %addr, "failed to bind listener");
                std::process::exit(1);
            }
        };

        let service = self
            .config
            .service_name
            .clone()
            .or_else(|| std::env::var("WEBSITE_SITE_NAME").ok())
            .unwrap_or_default();
        info!(
            port = %self.config.handler_port(),
            version = self.version.as_deref().unwrap_or(""),
            service = %service,
            "Instance initialized successfully!"
        );

        self.run(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves,
    /// then drain in-flight connections within the grace window.
    pub async fn run(self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        let server = Arc::new(self);
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            if is_closing_error(&err) {
                                debug!(error = %err, "listener closed");
                                break;
                            }
                            error!(error = %err, "failed to accept connection");
                            std::process::exit(1);
                        }
                    };
                    let io = TokioIo::new(stream);
                    let server = server.clone();
                    let service = service_fn(move |req| {
                        let server = server.clone();
                        async move { handle_request(req, server, remote_addr).await }
                    });
                    let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));
                    tokio::spawn(async move {
                        if let Err(err) = conn.await {
                            if is_closing_error(&err) {
                                debug!(error = %err, "connection closed");
                            } else {
                                error!(error = %err, "error serving connection");
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        // Stop accepting, then let in-flight invocations finish within
        // the grace window. Stragglers are dropped with the process.
        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => {
                debug!("all connections drained");
            }
            _ = tokio::time::sleep(server.config.shutdown_grace) => {
                warn!("grace window expired, dropping remaining connections");
            }
        }
    }
}

/// Run the handler on its own task, bounded by the context deadline.
///
/// The task boundary doubles as the recovery boundary: a panic inside
/// the handler surfaces as a join error here and is converted into an
/// ordinary unclassified failure. When the recording is lost with the
/// task, a fresh one stands in; the classifier's terminal page replaces
/// any partial output anyway.
async fn execute(
    handler: Arc<dyn HttpHandler>,
    mut recorder: ResponseRecorder,
    request: FunctionRequest,
    ctx: Arc<InvocationContext>,
) -> (ResponseRecorder, Result<(), HandlerError>) {
    let deadline = ctx.deadline();
    let task_ctx = ctx.clone();
    let mut task = tokio::spawn(async move {
        let result = handler.handle(&mut recorder, request, &task_ctx).await;
        (recorder, result)
    });

    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            let message = if join_err.is_panic() {
                let payload = join_err.into_panic();
                let text = payload
                    .downcast_ref::<&str>()
                    .map(|text| text.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "opaque panic payload".to_string());
                format!("handler panicked: {}", text)
            } else {
                format!("handler task failed: {}", join_err)
            };
            (
                ResponseRecorder::new(),
                Err(HandlerError::Other(message.into())),
            )
        }
        Err(_) => {
            task.abort();
            ctx.mark_deadline_exceeded();
            (
                ResponseRecorder::new(),
                Err(HandlerError::Other("invocation deadline exceeded".into())),
            )
        }
    }
}

/// Serialize the recording and captured logs into the outbound
/// envelope.
fn emit_response(recorder: ResponseRecorder, capture: LogCapture) -> HostResponse {
    let (status, headers, body) = recorder.into_parts();
    let output = InvokeResponse::new(
        status.0,
        headers,
        String::from_utf8_lossy(&body).into_owned(),
        capture.take(),
    );
    match output.to_bytes() {
        Ok(bytes) => {
            let mut headers = HashMap::new();
            headers.insert(
                "Content-Type".to_string(),
                "application/json; charset=utf-8".to_string(),
            );
            HostResponse {
                status: StatusCode::OK,
                headers,
                body: Bytes::from(bytes),
            }
        }
        Err(err) => {
            error!(error = %err, "cannot encode invocation response");
            plain_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("cannot encode json response: {}", err),
            )
        }
    }
}

/// Plain-text host response for failures outside the envelope
/// protocol.
fn plain_response(status: StatusCode, message: &str) -> HostResponse {
    let mut headers = HashMap::new();
    headers.insert(
        "Content-Type".to_string(),
        "text/plain; charset=utf-8".to_string(),
    );
    headers.insert("X-Content-Type-Options".to_string(), "nosniff".to_string());
    HostResponse {
        status,
        headers,
        body: Bytes::from(format!("{}\n", message)),
    }
}

/// Full diagnostic chain of an error, one cause per line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = err.to_string();
    let mut cause = err.source();
    while let Some(current) = cause {
        chain.push_str("\ncaused by: ");
        chain.push_str(&current.to_string());
        cause = current.source();
    }
    chain
}

/// Handle one inbound connection request from the host.
async fn handle_request(
    req: Request<Incoming>,
    server: Arc<BridgeServer>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let host = HostRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        headers,
        remote_addr: Some(remote_addr),
    };

    debug!(method = %host.method, path = %host.path, remote = %remote_addr, "host request received");

    let body = body.collect().await?.to_bytes();
    let response = server.dispatch(host, body).await;
    Ok(build_response(response))
}

/// Convert a bridge response into the hyper response for the wire.
fn build_response(response: HostResponse) -> Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(response.status.0).unwrap_or_else(|_| {
        warn!(
            status = response.status.0,
            "invalid status code, falling back to 500 Internal Server Error"
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }
    builder.body(Full::new(response.body)).unwrap()
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}

/// Check whether an error only reports an orderly close of the
/// listener or a connection.
fn is_closing_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = cause {
        if let Some(io_err) = current.downcast_ref::<std::io::Error>() {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ) {
                return true;
            }
        }
        cause = current.source();
    }
    let text = err.to_string();
    text.contains("connection closed") || text.contains("closed network connection")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_walks_sources() {
        let leaf = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: HandlerError = HandlerError::Other(Box::new(leaf));
        // HandlerError displays the inner error, so the chain starts
        // with the leaf message.
        assert_eq!(error_chain(&err), "disk on fire");

        let err = crate::envelope::InvokeRequest::decode(b"{").unwrap_err();
        let chain = error_chain(&err);
        assert!(chain.starts_with("cannot decode payload"));
        assert!(chain.contains("\ncaused by: "));
    }

    #[test]
    fn test_plain_response_shape() {
        let response = plain_response(StatusCode::NOT_FOUND, "Not Found");
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(&response.body[..], b"Not Found\n");
        assert_eq!(
            response.headers.get("X-Content-Type-Options").map(String::as_str),
            Some("nosniff")
        );
    }

    #[test]
    fn test_is_closing_error() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(is_closing_error(&reset));

        let textual = std::io::Error::new(
            std::io::ErrorKind::Other,
            "use of closed network connection",
        );
        assert!(is_closing_error(&textual));

        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(!is_closing_error(&refused));
    }
}
