//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → /health (unauthenticated)
//!     → /admin/* (bearer auth → admin handlers → registry)
//! ```

pub mod server;

pub use server::{AppContext, HttpServer};
