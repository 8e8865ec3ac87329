//! HTTP surface: routers, handlers and form parsing

pub mod handlers;
pub mod multipart;
pub mod routes;

pub use routes::create_router;
