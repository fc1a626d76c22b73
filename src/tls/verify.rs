//! Certificate verifiers handed to rustls.

use crate::x509::{self, Certificate};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use std::sync::{Arc, Mutex};

/// Accepts any certificate chain for any name. Handshake signatures are
/// still checked, so the peer must hold the key of the cert it sent.
#[derive(Debug)]
pub(crate) struct AcceptAnyCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyCert {
    pub(crate) fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// What the server presented during the handshake.
#[derive(Debug, Clone, Default)]
pub(crate) struct Observed {
    pub(crate) verified_chain: Vec<Certificate>,
    pub(crate) ocsp_response: Vec<u8>,
}

/// Delegates to `inner` and remembers the chain it accepted and the
/// stapled OCSP response. One instance per connection.
#[derive(Debug)]
pub(crate) struct RecordingVerifier {
    inner: Arc<dyn ServerCertVerifier>,
    record_chain: bool,
    anchors: Vec<Certificate>,
    observed: Mutex<Observed>,
}

impl RecordingVerifier {
    /// With `record_chain` false the inner verifier does not really verify,
    /// so nothing is reported as a verified chain. `anchors` are the trust
    /// roots `inner` was built from, when they are known as certificates.
    pub(crate) fn new(
        inner: Arc<dyn ServerCertVerifier>,
        record_chain: bool,
        anchors: Vec<Certificate>,
    ) -> Self {
        Self {
            inner,
            record_chain,
            anchors,
            observed: Mutex::new(Observed::default()),
        }
    }

    pub(crate) fn observed(&self) -> Observed {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let verified = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;
        let mut observed = self
            .observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observed.ocsp_response = ocsp_response.to_vec();
        if self.record_chain {
            let presented: Vec<Certificate> = intermediates.iter().map(Certificate::from).collect();
            observed.verified_chain =
                x509::build_chain(&Certificate::from(end_entity), &presented, &self.anchors);
        }
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(record_chain: bool) -> RecordingVerifier {
        let provider = rustls::crypto::ring::default_provider();
        RecordingVerifier::new(Arc::new(AcceptAnyCert::new(&provider)), record_chain, Vec::new())
    }

    fn present(v: &RecordingVerifier) {
        let ee = CertificateDer::from(vec![0x01]);
        let inter = [CertificateDer::from(vec![0x02])];
        let name = ServerName::try_from("example.org").unwrap();
        v.verify_server_cert(&ee, &inter, &name, &[0x14, 0x11], UnixTime::now())
            .unwrap();
    }

    #[test]
    fn records_chain_and_ocsp() {
        let v = verifier(true);
        present(&v);
        let observed = v.observed();
        // unparseable presented certs are not on any path
        assert_eq!(observed.verified_chain, vec![Certificate::from_der(vec![0x01])]);
        assert_eq!(observed.ocsp_response, vec![0x14, 0x11]);
    }

    #[test]
    fn skip_verify_reports_no_verified_chain() {
        let v = verifier(false);
        present(&v);
        let observed = v.observed();
        assert!(observed.verified_chain.is_empty());
        assert_eq!(observed.ocsp_response, vec![0x14, 0x11]);
    }

    #[test]
    fn schemes_come_from_the_provider() {
        assert!(!verifier(true).supported_verify_schemes().is_empty());
    }
}
