use super::verify::{AcceptAnyCert, RecordingVerifier};
use super::{version_name, VERSION_TLS10, VERSION_TLS11, VERSION_TLS12, VERSION_TLS13};
use crate::crypto::CipherSuiteSelector;
use crate::error::{Error, Result};
use crate::x509::CertPool;
use log::{debug, warn};
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Client configuration of the native engine.
///
/// `min_version` and `max_version` of 0 mean TLS 1.2 and TLS 1.3. A
/// `root_cas` of `None` trusts the bundled webpki roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub server_name: String,
    pub insecure_skip_verify: bool,
    pub min_version: u16,
    pub max_version: u16,
    pub next_protos: Vec<String>,
    pub root_cas: Option<Arc<CertPool>>,
    /// Accepted for compatibility. rustls always sends full-size records,
    /// so both settings behave the same.
    pub dynamic_record_sizing_disabled: bool,
}

fn parse_version(s: &str) -> std::result::Result<u16, String> {
    match s.trim().trim_start_matches("TLS").trim_start_matches("tls").trim() {
        "1.0" => Ok(VERSION_TLS10),
        "1.1" => Ok(VERSION_TLS11),
        "1.2" => Ok(VERSION_TLS12),
        "1.3" => Ok(VERSION_TLS13),
        other => Err(format!("unknown TLS version {:?}", other)),
    }
}

impl Config {
    /// Load configuration from the `[tls]` table of a TOML string.
    pub fn from_toml(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        #[derive(serde::Deserialize)]
        struct Root {
            tls: Section,
        }

        #[derive(serde::Deserialize)]
        struct Section {
            server_name: Option<String>,
            insecure_skip_verify: Option<bool>,
            min_version: Option<String>,
            max_version: Option<String>,
            next_protos: Option<Vec<String>>,
            root_ca_file: Option<PathBuf>,
            dynamic_record_sizing_disabled: Option<bool>,
        }

        let raw: Root = toml::from_str(s)?;
        let sec = raw.tls;
        let min_version = match sec.min_version {
            Some(v) => parse_version(&v)?,
            None => 0,
        };
        let max_version = match sec.max_version {
            Some(v) => parse_version(&v)?,
            None => 0,
        };
        let root_cas = match sec.root_ca_file {
            Some(path) => {
                let pem = std::fs::read(&path)?;
                let mut pool = CertPool::new();
                if !pool.append_certs_from_pem(&pem) {
                    return Err(format!("no certificates found in {}", path.display()).into());
                }
                Some(Arc::new(pool))
            }
            None => None,
        };
        Ok(Config {
            server_name: sec.server_name.unwrap_or_default(),
            insecure_skip_verify: sec.insecure_skip_verify.unwrap_or(false),
            min_version,
            max_version,
            next_protos: sec.next_protos.unwrap_or_default(),
            root_cas,
            dynamic_record_sizing_disabled: sec.dynamic_record_sizing_disabled.unwrap_or(false),
        })
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, v) in [("min_version", self.min_version), ("max_version", self.max_version)] {
            if v != 0 && version_name(v).is_none() {
                return Err(format!("{} {:#06x} is not a TLS version", name, v));
            }
        }
        if self.min_version != 0 && self.max_version != 0 && self.min_version > self.max_version {
            return Err("min_version must not exceed max_version".into());
        }
        if self.server_name.is_empty() && !self.insecure_skip_verify {
            return Err("either server_name or insecure_skip_verify must be set".into());
        }
        Ok(())
    }

    /// Protocol versions rustls may negotiate under this config.
    pub(crate) fn protocol_versions(&self) -> Result<Vec<&'static SupportedProtocolVersion>> {
        let min = if self.min_version == 0 {
            VERSION_TLS12
        } else {
            self.min_version
        };
        let max = if self.max_version == 0 {
            VERSION_TLS13
        } else {
            self.max_version
        };
        let versions: Vec<&'static SupportedProtocolVersion> = [
            (VERSION_TLS13, &rustls::version::TLS13),
            (VERSION_TLS12, &rustls::version::TLS12),
        ]
        .into_iter()
        .filter(|(v, _)| min <= *v && *v <= max)
        .map(|(_, p)| p)
        .collect();
        if versions.is_empty() {
            return Err(Error::UnsupportedVersions { min, max });
        }
        Ok(versions)
    }

    pub(crate) fn rustls_server_name(&self) -> Result<ServerName<'static>> {
        if self.server_name.is_empty() {
            if self.insecure_skip_verify {
                // an IP address name suppresses SNI
                return Ok(ServerName::IpAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED).into()));
            }
            return Err(Error::MissingServerName);
        }
        ServerName::try_from(self.server_name.as_str())
            .map(|name| name.to_owned())
            .map_err(|_| Error::InvalidServerName(self.server_name.clone()))
    }

    fn webpki_verifier(&self, provider: Arc<CryptoProvider>) -> Result<Arc<dyn ServerCertVerifier>> {
        let roots = match &self.root_cas {
            Some(pool) => pool.to_root_store()?,
            None => RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        };
        let verifier: Arc<dyn ServerCertVerifier> =
            WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| Error::Verifier(e.to_string()))?;
        Ok(verifier)
    }

    /// Builds the rustls client config together with the verifier that
    /// records what the handshake presented.
    pub(crate) fn client_config(&self) -> Result<(ClientConfig, Arc<RecordingVerifier>)> {
        let selector = CipherSuiteSelector::new();
        debug!(
            "building client config for {:?}: aes={:?} ghash={:?}",
            self.server_name,
            selector.aes_strategy(),
            selector.ghash_strategy()
        );
        let provider = Arc::new(selector.provider());
        let versions = self.protocol_versions()?;

        let inner: Arc<dyn ServerCertVerifier> = if self.insecure_skip_verify {
            warn!("certificate verification disabled for {:?}", self.server_name);
            Arc::new(AcceptAnyCert::new(&provider))
        } else {
            self.webpki_verifier(provider.clone())?
        };
        let anchors = self
            .root_cas
            .as_ref()
            .map(|pool| pool.certs().to_vec())
            .unwrap_or_default();
        let verifier = Arc::new(RecordingVerifier::new(
            inner,
            !self.insecure_skip_verify,
            anchors,
        ));

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();
        config.alpn_protocols = self
            .next_protos
            .iter()
            .map(|p| p.as_bytes().to_vec())
            .collect();
        Ok((config, verifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_toml() {
        let cfg_str = r#"
            [tls]
            server_name = "example.org"
            min_version = "1.2"
            max_version = "TLS1.3"
            next_protos = ["h2", "http/1.1"]
            dynamic_record_sizing_disabled = true
        "#;
        let cfg = Config::from_toml(cfg_str).unwrap();
        assert_eq!(cfg.server_name, "example.org");
        assert_eq!(cfg.min_version, VERSION_TLS12);
        assert_eq!(cfg.max_version, VERSION_TLS13);
        assert_eq!(cfg.next_protos, vec!["h2".to_string(), "http/1.1".to_string()]);
        assert!(cfg.dynamic_record_sizing_disabled);
        assert!(!cfg.insecure_skip_verify);
        assert!(cfg.root_cas.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_rejects_unknown_version() {
        let cfg_str = "[tls]\nserver_name = \"a.org\"\nmin_version = \"0.9\"\n";
        assert!(Config::from_toml(cfg_str).is_err());
    }

    #[test]
    fn toml_missing_root_file_is_an_error() {
        let cfg_str = "[tls]\nserver_name = \"a.org\"\nroot_ca_file = \"/nonexistent/ca.pem\"\n";
        assert!(Config::from_toml(cfg_str).is_err());
    }

    #[test]
    fn validate_catches_inverted_range() {
        let cfg = Config {
            server_name: "a.org".into(),
            min_version: VERSION_TLS13,
            max_version: VERSION_TLS12,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_identity_policy() {
        assert!(Config::default().validate().is_err());
        let insecure = Config {
            insecure_skip_verify: true,
            ..Config::default()
        };
        assert!(insecure.validate().is_ok());
    }

    #[test]
    fn default_range_is_tls12_and_tls13() {
        let versions = Config::default().protocol_versions().unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn legacy_min_is_clamped_to_tls12() {
        let cfg = Config {
            min_version: VERSION_TLS10,
            max_version: VERSION_TLS12,
            ..Config::default()
        };
        let versions = cfg.protocol_versions().unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_2);
    }

    #[test]
    fn legacy_only_range_is_unsupported() {
        let cfg = Config {
            min_version: VERSION_TLS10,
            max_version: VERSION_TLS11,
            ..Config::default()
        };
        assert!(matches!(
            cfg.protocol_versions(),
            Err(Error::UnsupportedVersions { .. })
        ));
    }

    #[test]
    fn alpn_is_carried_into_rustls() {
        let cfg = Config {
            server_name: "example.org".into(),
            next_protos: vec!["h2".into()],
            ..Config::default()
        };
        let (client, _) = cfg.client_config().unwrap();
        assert_eq!(client.alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn empty_name_with_skip_verify_sends_no_sni() {
        let cfg = Config {
            insecure_skip_verify: true,
            ..Config::default()
        };
        assert!(matches!(
            cfg.rustls_server_name().unwrap(),
            ServerName::IpAddress(_)
        ));
    }
}
