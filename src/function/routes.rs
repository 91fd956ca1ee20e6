//! Route table mapping function names to registered endpoints.

use crate::function::handler::HttpHandler;
use crate::http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A registered endpoint: the methods it accepts and its handler.
#[derive(Clone)]
pub struct Endpoint {
    /// Methods the endpoint declared acceptance for.
    pub methods: Vec<Method>,
    /// Shared handler implementation.
    pub handler: Arc<dyn HttpHandler>,
}

/// Function name to endpoint mapping.
///
/// Assembled during server construction, before the listener starts;
/// lookups after that point are read-only.
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<String, Endpoint>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under a function name. Re-registering a
    /// name replaces the previous endpoint.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        methods: Vec<Method>,
        handler: Arc<dyn HttpHandler>,
    ) {
        let name = name.into();
        if self
            .routes
            .insert(name.clone(), Endpoint { methods, handler })
            .is_some()
        {
            warn!(function = %name, "replaced an already registered function");
        }
    }

    /// Look up the endpoint for a function name.
    pub fn lookup(&self, name: &str) -> Option<&Endpoint> {
        self.routes.get(name)
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no endpoints.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::handler::HandlerError;
    use crate::http::{FunctionRequest, ResponseRecorder};
    use crate::runtime::InvocationContext;
    use async_trait::async_trait;

    struct NoopHandler;

    #[async_trait]
    impl HttpHandler for NoopHandler {
        async fn handle(
            &self,
            _res: &mut ResponseRecorder,
            _req: FunctionRequest,
            _ctx: &InvocationContext,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = RouteTable::new();
        table.register("items", vec![Method::Get, Method::Head], Arc::new(NoopHandler));

        let endpoint = table.lookup("items").unwrap();
        assert_eq!(endpoint.methods, vec![Method::Get, Method::Head]);
        assert!(table.lookup("missing").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reregistering_replaces() {
        let mut table = RouteTable::new();
        table.register("items", vec![Method::Get], Arc::new(NoopHandler));
        table.register("items", vec![Method::Post], Arc::new(NoopHandler));

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("items").unwrap().methods, vec![Method::Post]);
    }
}
