// Copyright (c) 2024, The overlaytls Project Authors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following disclaimer
//       in the documentation and/or other materials provided with the
//       distribution.
//
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived from
//       this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # Native TLS Engine Glue
//!
//! The native side of the adapter: this crate's own configuration, its
//! connection-state snapshot, and the client connection driven by
//! `rustls`. Handshake, record layer and certificate validation all live
//! in `rustls`; this module only builds its configuration (cipher order
//! from [`crate::crypto`], versions, trust roots, ALPN) and reads the
//! negotiated session back out.

mod config;
mod conn;
mod verify;

pub use config::Config;
pub use conn::Conn;

use crate::error::Result;
use crate::x509::Certificate;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

pub const VERSION_TLS10: u16 = 0x0301;
pub const VERSION_TLS11: u16 = 0x0302;
pub const VERSION_TLS12: u16 = 0x0303;
pub const VERSION_TLS13: u16 = 0x0304;

/// Human readable name of a protocol version, e.g. `"1.3"`.
pub fn version_name(version: u16) -> Option<&'static str> {
    match version {
        VERSION_TLS10 => Some("1.0"),
        VERSION_TLS11 => Some("1.1"),
        VERSION_TLS12 => Some("1.2"),
        VERSION_TLS13 => Some("1.3"),
        _ => None,
    }
}

/// Bidirectional byte stream a TLS session runs over.
pub trait Transport: Read + Write {
    fn close(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Operations every native TLS connection offers.
pub trait TlsConn: Read + Write {
    /// Runs the handshake to completion if it has not run yet.
    fn handshake(&mut self) -> Result<()>;
    /// Sends close_notify and closes the transport.
    fn close(&mut self) -> io::Result<()>;
    fn connection_state(&self) -> ConnectionState;
}

/// Details about a negotiated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub version: u16,
    pub handshake_complete: bool,
    pub did_resume: bool,
    pub cipher_suite: u16,
    pub negotiated_protocol: String,
    /// Always true: a client only accepts a protocol it offered.
    pub negotiated_protocol_is_mutual: bool,
    pub server_name: String,
    pub peer_certificates: Vec<Certificate>,
    pub verified_chains: Vec<Vec<Certificate>>,
    pub signed_certificate_timestamps: Vec<Vec<u8>>,
    pub ocsp_response: Vec<u8>,
    /// RFC 9266 `tls-exporter` value. Empty before TLS 1.3.
    pub channel_binding: Vec<u8>,
    /// IANA named group used for key exchange, 0 if unknown.
    pub key_exchange_group: u16,
}

/// Creates a client connection over `transport`. The handshake is not
/// started: it runs on the first read or write, or on
/// [`TlsConn::handshake`].
pub fn client<T: Transport>(transport: T, config: &Config) -> Result<Conn<T>> {
    let server_name = config.rustls_server_name()?;
    let (client_config, verifier) = config.client_config()?;
    let tls = rustls::ClientConnection::new(Arc::new(client_config), server_name)?;
    Ok(Conn::new(tls, transport, verifier, config.server_name.clone()))
}
