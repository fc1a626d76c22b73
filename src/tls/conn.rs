use super::verify::RecordingVerifier;
use super::{ConnectionState, TlsConn, Transport, VERSION_TLS13};
use crate::error::Result;
use crate::x509::Certificate;
use log::debug;
use rustls::{ClientConnection, HandshakeKind, StreamOwned};
use std::io::{self, Read, Write};
use std::sync::Arc;

/// RFC 9266 exporter label for `tls-exporter` channel bindings.
const CHANNEL_BINDING_LABEL: &[u8] = b"EXPORTER-Channel-Binding";
const CHANNEL_BINDING_LEN: usize = 32;

/// A client TLS connection over a caller supplied transport.
#[derive(Debug)]
pub struct Conn<T: Transport> {
    stream: StreamOwned<ClientConnection, T>,
    verifier: Arc<RecordingVerifier>,
    server_name: String,
}

impl<T: Transport> Conn<T> {
    pub(crate) fn new(
        tls: ClientConnection,
        transport: T,
        verifier: Arc<RecordingVerifier>,
        server_name: String,
    ) -> Self {
        Self {
            stream: StreamOwned::new(tls, transport),
            verifier,
            server_name,
        }
    }

    /// The underlying transport.
    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn is_handshaking(&self) -> bool {
        self.stream.conn.is_handshaking()
    }

    fn channel_binding(&self, version: u16) -> Vec<u8> {
        if self.is_handshaking() || version != VERSION_TLS13 {
            return Vec::new();
        }
        self.stream
            .conn
            .export_keying_material([0u8; CHANNEL_BINDING_LEN], CHANNEL_BINDING_LABEL, None)
            .map(|key| key.to_vec())
            .unwrap_or_default()
    }
}

impl<T: Transport> TlsConn for Conn<T> {
    fn handshake(&mut self) -> Result<()> {
        let StreamOwned { conn, sock } = &mut self.stream;
        while conn.is_handshaking() {
            conn.complete_io(sock)?;
        }
        debug!(
            "handshake with {:?} complete: version={:?} suite={:?}",
            self.server_name,
            conn.protocol_version(),
            conn.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let StreamOwned { conn, sock } = &mut self.stream;
        conn.send_close_notify();
        let mut sent = Ok(());
        while conn.wants_write() {
            if let Err(e) = conn.write_tls(sock) {
                sent = Err(e);
                break;
            }
        }
        let sent = sent.and_then(|()| sock.flush());
        // the transport is closed even when close_notify could not be sent
        let closed = sock.close();
        sent.and(closed)
    }

    fn connection_state(&self) -> ConnectionState {
        let conn = &self.stream.conn;
        let version = conn.protocol_version().map(u16::from).unwrap_or(0);
        let negotiated_protocol = conn
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default();
        let observed = self.verifier.observed();
        let verified_chains = if observed.verified_chain.is_empty() {
            Vec::new()
        } else {
            vec![observed.verified_chain]
        };
        ConnectionState {
            version,
            handshake_complete: !conn.is_handshaking(),
            did_resume: matches!(conn.handshake_kind(), Some(HandshakeKind::Resumed)),
            cipher_suite: conn
                .negotiated_cipher_suite()
                .map(|s| u16::from(s.suite()))
                .unwrap_or(0),
            negotiated_protocol_is_mutual: true,
            negotiated_protocol,
            server_name: self.server_name.clone(),
            peer_certificates: conn
                .peer_certificates()
                .map(|certs| certs.iter().map(Certificate::from).collect())
                .unwrap_or_default(),
            verified_chains,
            // rustls does not surface SCTs
            signed_certificate_timestamps: Vec::new(),
            ocsp_response: observed.ocsp_response,
            channel_binding: self.channel_binding(version),
            key_exchange_group: conn
                .negotiated_key_exchange_group()
                .map(|g| u16::from(g.name()))
                .unwrap_or(0),
        }
    }
}

impl<T: Transport> Read for Conn<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<T: Transport> Write for Conn<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
