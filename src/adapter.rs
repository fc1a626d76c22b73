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

//! # Foreign Config Adapter
//!
//! Lets callers that hold a [`foreign::Config`] drive the native engine.
//! Conversion is by allow-list: the fields in [`SUPPORTED_FIELDS`] are
//! copied verbatim, every other field must still hold its zero value,
//! otherwise the resulting connection would silently ignore part of what
//! the caller asked for and the conversion fails instead.
//!
//! The returned [`ForeignConn`] owns the native connection and forwards
//! all I/O to it; only [`ForeignConn::connection_state`] differs, returning
//! the foreign shape.

use crate::error::{Error, Result};
use crate::foreign;
use crate::tls::{self, TlsConn, Transport};
use log::debug;
use std::io::{self, Read, Write};

/// Foreign config fields the native engine can express.
pub const SUPPORTED_FIELDS: [&str; 7] = [
    "dynamic_record_sizing_disabled",
    "insecure_skip_verify",
    "max_version",
    "min_version",
    "next_protos",
    "root_cas",
    "server_name",
];

/// Fails with [`Error::IncompatibleConfig`] naming the first unsupported
/// field that holds a non-default value.
pub fn check_compatible(config: &foreign::Config) -> Result<()> {
    let unsupported: Vec<&'static str> = config
        .nonzero_fields()
        .into_iter()
        .filter(|field| !SUPPORTED_FIELDS.contains(field))
        .collect();
    match unsupported.first() {
        Some(&field) => {
            debug!("rejecting foreign config, unsupported fields set: {:?}", unsupported);
            Err(Error::IncompatibleConfig { field })
        }
        None => Ok(()),
    }
}

/// Converts a foreign config into the native one.
pub fn to_native(config: &foreign::Config) -> Result<tls::Config> {
    check_compatible(config)?;
    Ok(tls::Config {
        dynamic_record_sizing_disabled: config.dynamic_record_sizing_disabled,
        insecure_skip_verify: config.insecure_skip_verify,
        max_version: config.max_version,
        min_version: config.min_version,
        next_protos: config.next_protos.clone(),
        root_cas: config.root_cas.clone(),
        server_name: config.server_name.clone(),
    })
}

/// Like [`connect`] but does not run the handshake; it happens on first
/// I/O or on [`ForeignConn::handshake`].
///
/// `config` must set `server_name` or `insecure_skip_verify`.
pub fn client_conn<T: Transport>(
    transport: T,
    config: &foreign::Config,
) -> Result<ForeignConn<tls::Conn<T>>> {
    let native = to_native(config)?;
    Ok(ForeignConn::new(tls::client(transport, &native)?))
}

/// Converts `config`, then performs the handshake over `transport`.
///
/// Returns [`Error::IncompatibleConfig`] before any I/O when an
/// unsupported field is set. Handshake errors are returned as the engine
/// produced them.
pub fn connect<T: Transport>(
    transport: T,
    config: &foreign::Config,
) -> Result<ForeignConn<tls::Conn<T>>> {
    let mut conn = client_conn(transport, config)?;
    conn.handshake()?;
    Ok(conn)
}

/// Native→foreign state conversion. `channel_binding` becomes
/// `tls_unique`; `key_exchange_group` has no foreign counterpart and
/// `ech_accepted` no native one.
pub fn to_foreign_state(state: tls::ConnectionState) -> foreign::ConnectionState {
    foreign::ConnectionState {
        version: state.version,
        handshake_complete: state.handshake_complete,
        did_resume: state.did_resume,
        cipher_suite: state.cipher_suite,
        negotiated_protocol: state.negotiated_protocol,
        negotiated_protocol_is_mutual: state.negotiated_protocol_is_mutual,
        server_name: state.server_name,
        peer_certificates: state.peer_certificates,
        verified_chains: state.verified_chains,
        signed_certificate_timestamps: state.signed_certificate_timestamps,
        ocsp_response: state.ocsp_response,
        tls_unique: state.channel_binding,
        ech_accepted: false,
    }
}

/// A native connection presenting the foreign connection-state shape.
#[derive(Debug)]
pub struct ForeignConn<C: TlsConn> {
    inner: C,
}

impl<C: TlsConn> ForeignConn<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn handshake(&mut self) -> Result<()> {
        self.inner.handshake()
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }

    pub fn connection_state(&self) -> foreign::ConnectionState {
        to_foreign_state(self.inner.connection_state())
    }

    /// The wrapped native connection.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: TlsConn> Read for ForeignConn<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<C: TlsConn> Write for ForeignConn<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
