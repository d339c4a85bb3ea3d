//! Async clients for the CI servers that buildwatch can poll.
//!
//! Each backend lives in its own module and exposes a thin client that
//! speaks the server's JSON API. Transport settings (TLS, timeouts) are
//! shared through [`TransportConfig`]; every failure funnels into [`Error`].

pub mod error;
pub mod jenkins;
pub mod transport;

pub use error::Error;
pub use jenkins::{BasicAuth, JenkinsClient};
pub use transport::{TlsMode, TransportConfig};
