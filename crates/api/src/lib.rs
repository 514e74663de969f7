//! HTTP surface of the gateway.
//!
//! - GET  /config           : current configuration record
//! - PUT  /config (or POST) : merge and persist, admin-token gated when configured
//! - GET  /addresses        : configured addresses with warnings for gaps
//! - GET  /health           : RPC liveness for the configured network
//! - GET  /status           : loan (or vault manager) state
//! - GET  /price            : latest oracle round (also /oracle/price)

pub mod middleware;
pub mod routes;
pub mod state;
