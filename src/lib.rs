// overlaytls Core Library
//
// This library exposes CPU capability detection for AES and carry-less
// multiplication, a rustls based TLS client, and an adapter that accepts
// the wider foreign TLS configuration and connection-state shape.

pub mod adapter;
pub mod cpu;
pub mod crypto;
pub mod error;
pub mod foreign;
pub mod tls;
pub mod x509;

pub use adapter::{client_conn, connect, ForeignConn};
pub use cpu::{has_aes, has_pmull, Capabilities};
pub use error::{Error, Result};

/// Provides the process-wide CPU capability snapshot.
pub fn cpu_capabilities() -> Capabilities {
    cpu::capabilities()
}
