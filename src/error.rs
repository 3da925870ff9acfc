//! Crate error type.

use thiserror::Error;

/// Infrastructure failures: binding to a port or accepting connections.
///
/// Request-level failures (bad input, missing data, rejected media types)
/// are answered with a [`Response`](crate::Response), never surfaced here.
/// Renderer failures have their own [`RenderError`](crate::render::RenderError).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
