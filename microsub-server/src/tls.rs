use std::fs::File;
use std::io::{BufReader, Error, ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;

use rustls::server::AllowAnyAuthenticatedClient;
use rustls::{Certificate, PrivateKey, RootCertStore, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};

pub fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs: Vec<Certificate> = certs(&mut reader)?.into_iter().map(Certificate).collect();
    if certs.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("no certificates found in {}", path.display()),
        ));
    }
    Ok(certs)
}

/// First PKCS#8 key in the file, falling back to a PKCS#1 RSA key.
pub fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let mut reader = BufReader::new(File::open(path)?);
    if let Some(key) = pkcs8_private_keys(&mut reader)?.into_iter().next() {
        return Ok(PrivateKey(key));
    }

    let mut reader = BufReader::new(File::open(path)?);
    rsa_private_keys(&mut reader)?
        .into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("no private key found in {}", path.display()),
            )
        })
}

/// Server TLS config. Clients are authenticated by bearer token; a client CA
/// additionally requires every client to present a certificate signed by it.
pub fn make_server_config(
    cert_path: &Path,
    key_path: &Path,
    client_ca_path: Option<&Path>,
) -> Result<Arc<ServerConfig>> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let builder = ServerConfig::builder().with_safe_defaults();
    let config = match client_ca_path {
        Some(ca_path) => {
            let mut root_store = RootCertStore::empty();
            for cert in load_certs(ca_path)? {
                root_store
                    .add(&cert)
                    .map_err(|e| Error::new(ErrorKind::InvalidData, format!("invalid CA cert: {e}")))?;
            }
            builder
                .with_client_cert_verifier(Arc::new(AllowAnyAuthenticatedClient::new(root_store)))
                .with_single_cert(certs, key)
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key),
    }
    .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;

    Ok(Arc::new(config))
}
