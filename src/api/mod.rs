//! Raffle HTTP API
//!
//! Exposes the query, entry, automation and oracle-callback interfaces over
//! JSON. Error responses carry a stable code and the request id.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use handlers::AppState;
pub use server::{create_app, ApiServer};
