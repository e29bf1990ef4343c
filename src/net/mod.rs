//! Network layer.
//!
//! Listening sockets are owned by the HTTP server helpers; this module only
//! prepares transport security.

pub mod tls;
