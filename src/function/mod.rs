//! Handler trait, handler errors and the route table.

pub mod handler;
pub mod routes;

pub use handler::{HandlerError, HttpError, HttpHandler};
pub use routes::{Endpoint, RouteTable};
