//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server handles, coordinator
//!     → tracing events inside per-component spans
//!     → logging.rs subscriber (fmt, EnvFilter)
//!     → stdout
//! ```

pub mod logging;
