//! HTTP gateway for Shardline.
//!
//! Exposes `GET /object/{id}` and `PUT /object/{id}` over any
//! [`ObjectStore`](shardline_store::ObjectStore), normally a sharding router.
//! The gateway owns object-id validation and the mapping of store results to
//! HTTP statuses; it never sees which node served a request.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{GatewayConfig, ShardlineConfig, BUCKET_ENV, DEFAULT_BUCKET};
pub use error::{ApiError, GatewayError, GatewayResult, MessageResponse};
pub use handler::{AppState, HealthResponse, INVALID_ID_MESSAGE};
pub use server::ShardlineServer;
