//! funcbridge - Example Bridge Server
//!
//! This example runs the bridge with a few sample handlers. Pair it
//! with a function host, or post invocation envelopes by hand:
//!
//! ```text
//! curl -X POST localhost:8080/hello \
//!     -d '{"Data":{"req":{"Url":"/api/hello","Method":"GET"}}}'
//! ```

use funcbridge::prelude::*;

/// Example "Hello World" handler.
struct HelloHandler;

#[async_trait]
impl HttpHandler for HelloHandler {
    async fn handle(
        &self,
        res: &mut ResponseRecorder,
        req: FunctionRequest,
        ctx: &InvocationContext,
    ) -> Result<(), HandlerError> {
        let name = req.header("X-Name").unwrap_or("World").to_string();

        ctx.logger().with_field("name", name.clone()).info("Saying hello");

        res.json(&serde_json::json!({
            "message": format!("Hello, {}!", name),
            "method": req.method.to_string(),
            "path": req.url,
        }))?;
        Ok(())
    }
}

/// Echo handler, sends the request body straight back.
struct EchoHandler;

#[async_trait]
impl HttpHandler for EchoHandler {
    async fn handle(
        &self,
        res: &mut ResponseRecorder,
        req: FunctionRequest,
        _ctx: &InvocationContext,
    ) -> Result<(), HandlerError> {
        res.text(req.text());
        Ok(())
    }
}

/// Counter handler with state shared across invocations.
struct CounterHandler {
    count: std::sync::atomic::AtomicU64,
}

impl CounterHandler {
    fn new() -> Self {
        Self {
            count: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl HttpHandler for CounterHandler {
    async fn handle(
        &self,
        res: &mut ResponseRecorder,
        _req: FunctionRequest,
        _ctx: &InvocationContext,
    ) -> Result<(), HandlerError> {
        let count = self
            .count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;

        res.json(&serde_json::json!({ "count": count }))?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let config = BridgeConfig::new().host("0.0.0.0").port(8080);

    // Initialize process logging; per-invocation logs are captured
    // separately and travel back to the host in the envelope.
    funcbridge::logging::init(&config);

    tracing::info!("Starting funcbridge server...");

    let mut server = BridgeServer::new(config);
    server.register_get("hello", HelloHandler);
    server.register_post("echo", EchoHandler);
    server.register_get("counter", CounterHandler::new());

    tracing::info!("Registered functions: hello, echo, counter");

    server.serve().await
}
