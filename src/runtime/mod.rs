/// Module containing the handler trait and the fixed greeting
pub mod handler;
/// Module containing the secure listener and per-connection handling
pub mod server;
/// Module containing the bounded TLS handshake
pub mod tlshandler;
