//! # TLS Endpoint
//!
//! A minimal TLS-terminating HTTP/1.1 endpoint.
//!
//! The crate loads a certificate / key pair, binds a socket, upgrades every accepted connection
//! to TLS and answers exactly one request per connection with a fixed `200 OK`.
//!
//! Startup happens in explicit steps: [`ListenerConfig`] → [`credentials::load_credentials`] →
//! [`SecureListener::bind`] → [`SecureListener::spawn`]. [`serve`] runs all of them.
//!
//! Refer to the included binary for a complete server.

/// Module containing the layered listener configuration
pub mod config;
/// Module containing certificate and key loading
pub mod credentials;
/// Module containing the HTTP/1.1 framing
pub mod http;
/// Module containing the accept loop and connection handling
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use crate::config::{ConfigOverrides, ListenerConfig};
pub use runtime::{
    handler::{GREETING, Handler, SecureGreeting},
    server::{ListenerError, SecureListener, Server, serve},
};
