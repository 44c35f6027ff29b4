//! HTTP surface for the lookup service (feature `service`).
//!
//! Exposes a committed snapshot over a small axum API:
//!
//! - `GET /healthz` — liveness
//! - `GET /v1/snapshot` — the served snapshot record
//! - `GET /v1/lookup?lat=&lon=[&layer=]` — point-in-polygon lookup
//! - `GET /v1/metrics` — rolling lookup metrics

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::ServiceState;
