//! Review UI HTTP surface.
//!
//! Thin `axum` layer over `recon-resolution`/`recon-store`: a filtered list
//! of Resolutions and a per-resolution edit action. No auth, no metrics —
//! an internal review tool, not a public API.

mod config;
mod error;
mod routes;
mod server;
mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use routes::corrections;
pub use server::{build_router, start_server};
pub use state::ServerState;
