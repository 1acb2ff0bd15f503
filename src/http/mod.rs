//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → request.rs (correlation ID)
//!     → server.rs (defense chain around application routes)
//!     → handler
//!     → response.rs (rejection shaping) on any defense failure
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, DefenseServer};
