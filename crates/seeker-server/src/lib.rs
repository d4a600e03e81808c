//! HTTP server: SSE search stream, catalog metadata, health and OpenAPI docs.

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
