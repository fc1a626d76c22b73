use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A foreign config field we cannot convert holds a non-default value.
    #[error("incompatible stdlib config: field {field} is nonzero")]
    IncompatibleConfig { field: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("no supported protocol version between {min:#06x} and {max:#06x}")]
    UnsupportedVersions { min: u16, max: u16 },
    #[error("either server_name or insecure_skip_verify must be set in the config")]
    MissingServerName,
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    #[error("certificate verifier: {0}")]
    Verifier(String),
}

impl Error {
    /// Returns true when the config was rejected before any network I/O.
    pub fn is_incompatible_config(&self) -> bool {
        matches!(self, Error::IncompatibleConfig { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
