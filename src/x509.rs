//! Certificate types shared by the native and the foreign shapes.

use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::io::BufReader;
use x509_parser::certificate::X509Certificate;

/// Longest issuer path walked when rebuilding a verified chain.
const MAX_CHAIN_DEPTH: usize = 8;

/// A DER encoded X.509 certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Certificate {
    pub raw: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { raw: der.into() }
    }

    pub fn to_der(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.raw.clone())
    }
}

impl From<&CertificateDer<'_>> for Certificate {
    fn from(der: &CertificateDer<'_>) -> Self {
        Self::from_der(der.as_ref())
    }
}

/// A set of trust anchors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertPool {
    certs: Vec<Certificate>,
}

impl CertPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cert(&mut self, cert: Certificate) {
        if !self.certs.contains(&cert) {
            self.certs.push(cert);
        }
    }

    /// Adds every CERTIFICATE block found in `pem`. Returns whether at
    /// least one certificate was added.
    pub fn append_certs_from_pem(&mut self, pem: &[u8]) -> bool {
        let mut reader = BufReader::new(pem);
        let ders = match rustls_pemfile::certs(&mut reader) {
            Ok(ders) => ders,
            Err(_) => return false,
        };
        let before = self.certs.len();
        for der in ders {
            self.add_cert(Certificate::from_der(der));
        }
        self.certs.len() > before
    }

    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Builds the trust store handed to the verifier. Any certificate that
    /// cannot serve as a trust anchor fails the whole conversion.
    pub fn to_root_store(&self) -> Result<RootCertStore, rustls::Error> {
        let mut store = RootCertStore::empty();
        for cert in &self.certs {
            store.add(cert.to_der())?;
        }
        Ok(store)
    }
}

fn parse(cert: &Certificate) -> Option<X509Certificate<'_>> {
    x509_parser::parse_x509_certificate(&cert.raw)
        .ok()
        .map(|(_, parsed)| parsed)
}

/// Name match alone is not enough: two roots may share a subject.
fn issued_by(child: &X509Certificate<'_>, parent: &X509Certificate<'_>) -> bool {
    child.issuer() == parent.subject()
        && child.verify_signature(Some(parent.public_key())).is_ok()
}

/// Rebuilds the path from `end_entity` up to a certificate in `anchors`,
/// using only the `intermediates` that are on it.
///
/// The anchor closes the chain when it is one of `anchors`. Anchors known
/// only by name and key (the bundled webpki roots) have no certificate to
/// append, so such a chain stops at the last intermediate.
pub(crate) fn build_chain(
    end_entity: &Certificate,
    intermediates: &[Certificate],
    anchors: &[Certificate],
) -> Vec<Certificate> {
    let mut chain = vec![end_entity.clone()];
    if anchors.contains(end_entity) {
        return chain;
    }
    let mut current = match parse(end_entity) {
        Some(parsed) => parsed,
        None => return chain,
    };
    for _ in 0..MAX_CHAIN_DEPTH {
        let anchor = anchors
            .iter()
            .find(|a| parse(a).map_or(false, |p| issued_by(&current, &p)));
        if let Some(anchor) = anchor {
            chain.push(anchor.clone());
            break;
        }
        let next = intermediates
            .iter()
            .filter(|c| !chain.contains(*c))
            .find_map(|c| {
                let parsed = parse(c)?;
                issued_by(&current, &parsed).then_some((c, parsed))
            });
        match next {
            Some((cert, parsed)) => {
                chain.push(cert.clone());
                current = parsed;
            }
            None => break,
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pki {
        root: Certificate,
        intermediate: Certificate,
        leaf: Certificate,
    }

    fn issued(name: &str, is_ca: bool) -> rcgen::CertificateParams {
        let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        if is_ca {
            params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        }
        params
    }

    fn three_level_pki() -> Pki {
        let root_key = rcgen::KeyPair::generate().unwrap();
        let root = issued("root.test", true).self_signed(&root_key).unwrap();
        let mid_key = rcgen::KeyPair::generate().unwrap();
        let mid = issued("mid.test", true)
            .signed_by(&mid_key, &root, &root_key)
            .unwrap();
        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf = issued("leaf.test", false)
            .signed_by(&leaf_key, &mid, &mid_key)
            .unwrap();
        Pki {
            root: Certificate::from_der(root.der().to_vec()),
            intermediate: Certificate::from_der(mid.der().to_vec()),
            leaf: Certificate::from_der(leaf.der().to_vec()),
        }
    }

    #[test]
    fn pool_deduplicates() {
        let mut pool = CertPool::new();
        pool.add_cert(Certificate::from_der(vec![1, 2, 3]));
        pool.add_cert(Certificate::from_der(vec![1, 2, 3]));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn pem_without_certificates_adds_nothing() {
        let mut pool = CertPool::new();
        assert!(!pool.append_certs_from_pem(b"not a pem file"));
        assert!(pool.is_empty());
    }

    #[test]
    fn garbage_der_is_not_a_trust_anchor() {
        let mut pool = CertPool::new();
        pool.add_cert(Certificate::from_der(vec![0x30, 0x00]));
        assert!(pool.to_root_store().is_err());
    }

    #[test]
    fn empty_pool_builds_empty_store() {
        let store = CertPool::new().to_root_store().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn chain_ends_at_the_trusted_root() {
        let pki = three_level_pki();
        let chain = build_chain(
            &pki.leaf,
            &[pki.intermediate.clone()],
            &[pki.root.clone()],
        );
        assert_eq!(chain, vec![pki.leaf, pki.intermediate, pki.root]);
    }

    #[test]
    fn unrelated_intermediates_are_left_out() {
        let pki = three_level_pki();
        let stray = three_level_pki();
        let chain = build_chain(
            &pki.leaf,
            &[stray.intermediate.clone(), pki.intermediate.clone()],
            &[pki.root.clone()],
        );
        assert_eq!(chain, vec![pki.leaf, pki.intermediate, pki.root]);
    }

    #[test]
    fn same_subject_different_key_is_not_the_issuer() {
        let pki = three_level_pki();
        // identical names, different keys
        let impostor = three_level_pki();
        let chain = build_chain(&pki.leaf, &[pki.intermediate.clone()], &[impostor.root]);
        assert_eq!(chain, vec![pki.leaf, pki.intermediate]);
    }

    #[test]
    fn trusted_leaf_is_its_own_chain() {
        let pki = three_level_pki();
        let chain = build_chain(&pki.leaf, &[], &[pki.leaf.clone()]);
        assert_eq!(chain, vec![pki.leaf]);
    }

    #[test]
    fn unparseable_leaf_is_kept_alone() {
        let junk = Certificate::from_der(vec![0x30, 0x00]);
        assert_eq!(build_chain(&junk, &[], &[]), vec![junk]);
    }
}
