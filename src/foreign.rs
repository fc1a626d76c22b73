//! The foreign TLS shape: the full-featured configuration and connection
//! state many callers already hold. Only part of it can be expressed by
//! the native engine; see [`crate::adapter`].

use crate::x509::{CertPool, Certificate};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

pub type RandFn = Arc<dyn Fn(&mut [u8]) -> io::Result<()> + Send + Sync>;
pub type TimeFn = Arc<dyn Fn() -> SystemTime + Send + Sync>;
pub type GetCertificateFn = Arc<dyn Fn(&ClientHelloInfo) -> Result<KeyPair, String> + Send + Sync>;
pub type GetClientCertificateFn =
    Arc<dyn Fn(&CertificateRequestInfo) -> Result<KeyPair, String> + Send + Sync>;
pub type GetConfigForClientFn =
    Arc<dyn Fn(&ClientHelloInfo) -> Result<Option<Config>, String> + Send + Sync>;
pub type VerifyPeerCertificateFn =
    Arc<dyn Fn(&[Vec<u8>], &[Vec<Certificate>]) -> Result<(), String> + Send + Sync>;
pub type VerifyConnectionFn = Arc<dyn Fn(&ConnectionState) -> Result<(), String> + Send + Sync>;
pub type UnwrapSessionFn =
    Arc<dyn Fn(&[u8], &ConnectionState) -> Result<Option<Vec<u8>>, String> + Send + Sync>;
pub type WrapSessionFn =
    Arc<dyn Fn(&ConnectionState, &[u8]) -> Result<Vec<u8>, String> + Send + Sync>;
pub type EchRejectionVerifyFn = Arc<dyn Fn(&ConnectionState) -> Result<(), String> + Send + Sync>;
pub type KeyLogWriter = Arc<Mutex<dyn Write + Send>>;

/// A certificate chain and its private key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPair {
    pub certificate: Vec<Certificate>,
    pub private_key: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientHelloInfo {
    pub server_name: String,
    pub supported_protos: Vec<String>,
    pub supported_versions: Vec<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct CertificateRequestInfo {
    pub acceptable_cas: Vec<Vec<u8>>,
    pub version: u16,
}

/// Cache of resumable client sessions, keyed by server.
pub trait ClientSessionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn put(&self, key: &str, session: Option<Vec<u8>>);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientAuthType {
    #[default]
    NoClientCert,
    RequestClientCert,
    RequireAnyClientCert,
    VerifyClientCertIfGiven,
    RequireAndVerifyClientCert,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenegotiationSupport {
    #[default]
    Never,
    OnceAsClient,
    FreelyAsClient,
}

/// IANA TLS named group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurveId(pub u16);

/// Foreign TLS configuration. Every field defaults to its zero value.
#[derive(Clone, Default)]
pub struct Config {
    pub rand: Option<RandFn>,
    pub time: Option<TimeFn>,
    pub certificates: Vec<KeyPair>,
    pub get_certificate: Option<GetCertificateFn>,
    pub get_client_certificate: Option<GetClientCertificateFn>,
    pub get_config_for_client: Option<GetConfigForClientFn>,
    pub verify_peer_certificate: Option<VerifyPeerCertificateFn>,
    pub verify_connection: Option<VerifyConnectionFn>,
    pub root_cas: Option<Arc<CertPool>>,
    pub next_protos: Vec<String>,
    pub server_name: String,
    pub client_auth: ClientAuthType,
    pub client_cas: Option<Arc<CertPool>>,
    pub insecure_skip_verify: bool,
    pub cipher_suites: Vec<u16>,
    pub prefer_server_cipher_suites: bool,
    pub session_tickets_disabled: bool,
    pub session_ticket_key: [u8; 32],
    pub client_session_cache: Option<Arc<dyn ClientSessionCache>>,
    pub unwrap_session: Option<UnwrapSessionFn>,
    pub wrap_session: Option<WrapSessionFn>,
    pub min_version: u16,
    pub max_version: u16,
    pub curve_preferences: Vec<CurveId>,
    pub dynamic_record_sizing_disabled: bool,
    pub renegotiation: RenegotiationSupport,
    pub key_log_writer: Option<KeyLogWriter>,
    pub encrypted_client_hello_config_list: Vec<u8>,
    pub encrypted_client_hello_rejection_verify: Option<EchRejectionVerifyFn>,
}

impl Config {
    /// Names of every field holding a non-default value, in declaration
    /// order.
    pub fn nonzero_fields(&self) -> Vec<&'static str> {
        // No `..` here: a new field fails to compile until it is listed.
        let Config {
            rand,
            time,
            certificates,
            get_certificate,
            get_client_certificate,
            get_config_for_client,
            verify_peer_certificate,
            verify_connection,
            root_cas,
            next_protos,
            server_name,
            client_auth,
            client_cas,
            insecure_skip_verify,
            cipher_suites,
            prefer_server_cipher_suites,
            session_tickets_disabled,
            session_ticket_key,
            client_session_cache,
            unwrap_session,
            wrap_session,
            min_version,
            max_version,
            curve_preferences,
            dynamic_record_sizing_disabled,
            renegotiation,
            key_log_writer,
            encrypted_client_hello_config_list,
            encrypted_client_hello_rejection_verify,
        } = self;

        let checks = [
            ("rand", rand.is_some()),
            ("time", time.is_some()),
            ("certificates", !certificates.is_empty()),
            ("get_certificate", get_certificate.is_some()),
            ("get_client_certificate", get_client_certificate.is_some()),
            ("get_config_for_client", get_config_for_client.is_some()),
            ("verify_peer_certificate", verify_peer_certificate.is_some()),
            ("verify_connection", verify_connection.is_some()),
            ("root_cas", root_cas.is_some()),
            ("next_protos", !next_protos.is_empty()),
            ("server_name", !server_name.is_empty()),
            ("client_auth", *client_auth != ClientAuthType::default()),
            ("client_cas", client_cas.is_some()),
            ("insecure_skip_verify", *insecure_skip_verify),
            ("cipher_suites", !cipher_suites.is_empty()),
            ("prefer_server_cipher_suites", *prefer_server_cipher_suites),
            ("session_tickets_disabled", *session_tickets_disabled),
            ("session_ticket_key", session_ticket_key.iter().any(|b| *b != 0)),
            ("client_session_cache", client_session_cache.is_some()),
            ("unwrap_session", unwrap_session.is_some()),
            ("wrap_session", wrap_session.is_some()),
            ("min_version", *min_version != 0),
            ("max_version", *max_version != 0),
            ("curve_preferences", !curve_preferences.is_empty()),
            ("dynamic_record_sizing_disabled", *dynamic_record_sizing_disabled),
            ("renegotiation", *renegotiation != RenegotiationSupport::default()),
            ("key_log_writer", key_log_writer.is_some()),
            (
                "encrypted_client_hello_config_list",
                !encrypted_client_hello_config_list.is_empty(),
            ),
            (
                "encrypted_client_hello_rejection_verify",
                encrypted_client_hello_rejection_verify.is_some(),
            ),
        ];
        checks
            .into_iter()
            .filter(|(_, nonzero)| *nonzero)
            .map(|(name, _)| name)
            .collect()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_name", &self.server_name)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("next_protos", &self.next_protos)
            .field("root_cas", &self.root_cas)
            .field("nonzero_fields", &self.nonzero_fields())
            .finish_non_exhaustive()
    }
}

/// Foreign view of a negotiated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub version: u16,
    pub handshake_complete: bool,
    pub did_resume: bool,
    pub cipher_suite: u16,
    pub negotiated_protocol: String,
    /// Deprecated upstream; always true for client connections.
    pub negotiated_protocol_is_mutual: bool,
    pub server_name: String,
    pub peer_certificates: Vec<Certificate>,
    pub verified_chains: Vec<Vec<Certificate>>,
    pub signed_certificate_timestamps: Vec<Vec<u8>>,
    pub ocsp_response: Vec<u8>,
    /// Carries the RFC 9266 `tls-exporter` binding, not RFC 5929
    /// `tls-unique`: 32 bytes on TLS 1.3, empty on TLS 1.2 and earlier.
    /// Peers checking a tls-unique binding will not accept this value.
    pub tls_unique: Vec<u8>,
    pub ech_accepted: bool,
}
