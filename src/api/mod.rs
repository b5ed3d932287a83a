//! HTTP surface over the generation pipeline

pub mod handlers;
pub mod routes;

pub use routes::create_router;
