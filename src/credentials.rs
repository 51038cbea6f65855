//! Loading of the server certificate chain and private key.
//!
//! Both files are read once at startup. The key is checked against the leaf
//! certificate before the bundle is handed out, so a listener can never be
//! started with a pair rustls would only reject during a handshake.

use std::{
    fmt,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    ServerConfig,
    crypto::{CryptoProvider, aws_lc_rs},
    pki_types::{CertificateDer, PrivateKeyDer},
    sign::CertifiedKey,
};
use thiserror::Error;

/// Coarse classification of a [`CredentialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialErrorKind {
    /// A credential file does not exist.
    FileNotFound,
    /// A credential file exists but could not be read.
    ReadError,
    /// The file contents are not usable certificate / key material.
    ParseError,
}

/// Represents the kind of error that can occur while loading credentials
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The file at the given path does not exist.
    #[error("credential file not found: {}", path.display())]
    FileNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file could not be opened or read.
    #[error("failed to read credential file {}: {source}", path.display())]
    Read {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        source: io::Error,
    },

    /// The bytes are not a certificate chain / private key, or the two do not belong together.
    #[error("invalid credential material: {reason}")]
    Parse {
        /// What was wrong with the material.
        reason: String,
    },
}

impl CredentialError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> CredentialErrorKind {
        match self {
            Self::FileNotFound { .. } => CredentialErrorKind::FileNotFound,
            Self::Read { .. } => CredentialErrorKind::ReadError,
            Self::Parse { .. } => CredentialErrorKind::ParseError,
        }
    }

    fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}

/// A parsed certificate chain together with its matching private key.
pub struct CredentialBundle {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("certificates", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// Reads the certificate chain at `cert_path` and the private key at `key_path`.
///
/// # Errors
///
/// Returns `CredentialError::FileNotFound` / `CredentialError::Read` if a file cannot be read and
/// `CredentialError::Parse` if the contents are invalid or the key does not match the certificate.
pub fn load_credentials(
    cert_path: &Path,
    key_path: &Path,
) -> Result<CredentialBundle, CredentialError> {
    let cert_pem = read_file(cert_path)?;
    let key_pem = read_file(key_path)?;
    CredentialBundle::from_pem(&cert_pem, &key_pem)
}

fn read_file(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            CredentialError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CredentialError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

impl CredentialBundle {
    /// Parses PEM-encoded certificate chain and private key bytes.
    ///
    /// The first private key found (PKCS#8, PKCS#1 or SEC1) is used.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Parse` if either PEM is malformed or empty, the key cannot be
    /// loaded or the key does not match the leaf certificate.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, CredentialError> {
        let cert_chain = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CredentialError::parse(format!("malformed certificate PEM: {e}")))?;

        if cert_chain.is_empty() {
            return Err(CredentialError::parse("no certificate found"));
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
            .map_err(|e| CredentialError::parse(format!("malformed private key PEM: {e}")))?
            .ok_or_else(|| CredentialError::parse("no private key found"))?;

        let signing_key = provider()
            .key_provider
            .load_private_key(key.clone_key())
            .map_err(|e| CredentialError::parse(format!("unusable private key: {e}")))?;

        CertifiedKey::new(cert_chain.clone(), signing_key)
            .keys_match()
            .map_err(|e| {
                CredentialError::parse(format!("private key does not match certificate: {e}"))
            })?;

        Ok(Self { cert_chain, key })
    }

    /// Number of certificates in the chain, leaf first.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.cert_chain.len()
    }

    /// Builds the rustls server configuration used for every handshake.
    ///
    /// Protocol versions and cipher suites are the rustls defaults; no client certificates are requested.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Parse` if rustls rejects the certificate / key pair.
    pub fn into_server_config(self) -> Result<Arc<ServerConfig>, CredentialError> {
        let config = ServerConfig::builder_with_provider(Arc::new(provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| CredentialError::parse(format!("unsupported protocol versions: {e}")))?
            .with_no_client_auth()
            .with_single_cert(self.cert_chain, self.key)
            .map_err(|e| CredentialError::parse(format!("rejected certificate / key pair: {e}")))?;

        Ok(Arc::new(config))
    }
}

fn provider() -> CryptoProvider {
    aws_lc_rs::default_provider()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::{
        credentials::{CredentialBundle, CredentialErrorKind, load_credentials},
        test_support::{TestCredentials, mismatched_key_pem},
    };

    #[test]
    fn valid_pair_loads() {
        let credentials = TestCredentials::generate();

        let bundle = load_credentials(&credentials.cert_path, &credentials.key_path).unwrap();

        assert_eq!(bundle.chain_len(), 1);
        assert!(bundle.into_server_config().is_ok());
    }

    #[test]
    fn loading_is_idempotent() {
        let credentials = TestCredentials::generate();

        let first = load_credentials(&credentials.cert_path, &credentials.key_path).unwrap();
        let second = load_credentials(&credentials.cert_path, &credentials.key_path).unwrap();

        assert_eq!(first.chain_len(), second.chain_len());
    }

    #[test]
    fn mismatched_key_throws_parseerror() {
        let credentials = TestCredentials::generate();
        let other_key = mismatched_key_pem();

        let result = CredentialBundle::from_pem(credentials.cert_pem.as_bytes(), other_key.as_bytes());

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ParseError);
    }

    #[test]
    fn missing_cert_file_throws_filenotfound() {
        let credentials = TestCredentials::generate();

        let result = load_credentials(Path::new("/nonexistent/cert.pem"), &credentials.key_path);

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::FileNotFound);
    }

    #[test]
    fn missing_key_file_throws_filenotfound() {
        let credentials = TestCredentials::generate();

        let result = load_credentials(&credentials.cert_path, Path::new("/nonexistent/key.pem"));

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::FileNotFound);
    }

    #[test]
    fn directory_instead_of_file_throws_readerror() {
        let credentials = TestCredentials::generate();

        let result = load_credentials(&credentials.dir, &credentials.key_path);

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ReadError);
    }

    #[test]
    fn rejects_empty_pem() {
        let result = CredentialBundle::from_pem(b"", b"");
        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ParseError);
    }

    #[test]
    fn rejects_garbage_pem() {
        let result = CredentialBundle::from_pem(b"not a pem", b"also not a pem");
        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ParseError);
    }

    #[test]
    fn rejects_certificate_as_key() {
        let credentials = TestCredentials::generate();

        let result = CredentialBundle::from_pem(
            credentials.cert_pem.as_bytes(),
            credentials.cert_pem.as_bytes(),
        );

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ParseError);
    }

    #[test]
    fn rejects_swapped_files() {
        let credentials = TestCredentials::generate();

        let result = load_credentials(&credentials.key_path, &credentials.cert_path);

        assert_eq!(result.unwrap_err().kind(), CredentialErrorKind::ParseError);
    }
}
