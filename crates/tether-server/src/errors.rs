//! Server error types.

use thiserror::Error;

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No listener was configured.
    #[error("no listeners configured")]
    NoListeners,

    /// A listener could not bind its address.
    #[error("listener {name} failed to bind {addr}: {source}")]
    Bind {
        /// Listener name.
        name: String,
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
