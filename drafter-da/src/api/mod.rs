//! HTTP API handlers for drafter-da
//!
//! **[DA-MS-010]** Ingestion + status via HTTP REST, progress via SSE

pub mod analyze;
pub mod health;
pub mod sse;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use sse::event_stream;
