//! Exit status of the `tls-endpoint` binary when startup fails.

use std::{net::TcpListener, path::PathBuf, process::ExitStatus, time::Duration};

use rcgen::{CertificateParams, KeyPair};
use tokio::{process::Command, time::timeout};

const BINARY: &str = env!("CARGO_BIN_EXE_tls-endpoint");

/// Writes a self-signed `localhost` certificate and key into a fresh temp directory.
fn write_credentials(name: &str) -> (PathBuf, PathBuf) {
    let key_pair = KeyPair::generate().unwrap();
    let cert = CertificateParams::new(vec!["localhost".to_string()])
        .unwrap()
        .self_signed(&key_pair)
        .unwrap();

    let dir = std::env::temp_dir().join(format!("tls-endpoint-startup-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}

async fn run_binary(port: u16, cert: &str, key: &str) -> ExitStatus {
    let mut child = Command::new(BINARY)
        .args(["--address", "127.0.0.1", "--port", &port.to_string()])
        .args(["--cert", cert, "--key", key])
        .env("RUST_LOG", "off")
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("binary kept running after a startup failure")
        .unwrap()
}

#[tokio::test]
async fn missing_certificate_exits_with_failure() {
    let status = run_binary(18452, "/nonexistent/cert.pem", "/nonexistent/key.pem").await;

    assert!(!status.success());
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn port_in_use_exits_with_failure() {
    let (cert, key) = write_credentials("port-in-use");
    let _occupied = TcpListener::bind("127.0.0.1:18453").unwrap();

    let status = run_binary(18453, cert.to_str().unwrap(), key.to_str().unwrap()).await;

    assert!(!status.success());
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn port_zero_exits_with_failure() {
    let (cert, key) = write_credentials("port-zero");

    let status = run_binary(0, cert.to_str().unwrap(), key.to_str().unwrap()).await;

    assert_eq!(status.code(), Some(1));
}
