//! Self-signed credentials and TLS clients shared by the unit tests.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use rcgen::{CertificateParams, KeyPair};
use rustls::{
    ClientConfig, RootCertStore, crypto::aws_lc_rs, pki_types::CertificateDer,
};
use tokio_rustls::TlsConnector;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// A freshly generated certificate / key pair for `localhost`, written to a private temp directory.
pub struct TestCredentials {
    pub dir: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_pem: String,
    pub cert_der: CertificateDer<'static>,
}

impl TestCredentials {
    pub fn generate() -> Self {
        let key_pair = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let dir = std::env::temp_dir().join(format!(
            "tls-endpoint-test-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir).unwrap();

        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        Self {
            dir,
            cert_path,
            key_path,
            cert_pem: cert.pem(),
            cert_der: cert.der().clone(),
        }
    }

    /// A connector that trusts exactly this certificate.
    pub fn connector(&self) -> TlsConnector {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert_der.clone()).unwrap();

        let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();

        TlsConnector::from(Arc::new(config))
    }
}

impl Drop for TestCredentials {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// A PEM private key unrelated to any generated certificate.
pub fn mismatched_key_pem() -> String {
    KeyPair::generate().unwrap().serialize_pem()
}
