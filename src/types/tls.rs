use rustls_pemfile::{certs, pkcs8_private_keys};
use std::fs::File;
use std::io::{BufReader, Error as IoError, ErrorKind};
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{self, ClientConfig, ServerConfig};

/// Certificates for the mutually authenticated link between the serving and
/// the home network. Both ends present a certificate issued by the same CA.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    pub ca_path: String,
    pub server_name: String,
}

impl TlsConfig {
    pub fn from_env() -> Option<Self> {
        let cert_path = std::env::var("TLS_CERT_PATH").ok()?;
        let key_path = std::env::var("TLS_KEY_PATH").ok()?;
        let ca_path = std::env::var("TLS_CA_PATH").ok()?;
        let server_name =
            std::env::var("TLS_SERVER_NAME").unwrap_or_else(|_| "localhost".to_string());

        if cert_path.is_empty() || key_path.is_empty() || ca_path.is_empty() {
            return None;
        }

        Some(Self {
            cert_path,
            key_path,
            ca_path,
            server_name,
        })
    }

    fn load_identity(&self) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), IoError> {
        let mut cert_reader = BufReader::new(File::open(&self.cert_path)?);
        let mut key_reader = BufReader::new(File::open(&self.key_path)?);

        let cert_chain = certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
        let mut keys = pkcs8_private_keys(&mut key_reader).collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(IoError::new(ErrorKind::InvalidInput, "No private keys found"));
        }

        Ok((cert_chain, keys.remove(0).into()))
    }

    fn load_roots(&self) -> Result<Arc<rustls::RootCertStore>, IoError> {
        let mut ca_reader = BufReader::new(File::open(&self.ca_path)?);
        let ca_certs = certs(&mut ca_reader).collect::<Result<Vec<_>, _>>()?;

        let mut root_cert_store = rustls::RootCertStore::empty();
        for cert in ca_certs {
            root_cert_store.add(cert).map_err(|e| {
                IoError::new(ErrorKind::InvalidInput, format!("Failed to add CA: {}", e))
            })?;
        }
        Ok(Arc::new(root_cert_store))
    }

    /// Home network side: client certificates are mandatory.
    pub fn build_server_config(&self) -> Result<Arc<ServerConfig>, IoError> {
        let (cert_chain, key) = self.load_identity()?;

        let client_cert_verifier = rustls::server::WebPkiClientVerifier::builder(self.load_roots()?)
            .build()
            .map_err(|e| {
                IoError::new(ErrorKind::InvalidInput, format!("Failed to build verifier: {}", e))
            })?;

        let config = ServerConfig::builder()
            .with_client_cert_verifier(client_cert_verifier)
            .with_single_cert(cert_chain, key)
            .map_err(|e| IoError::new(ErrorKind::InvalidInput, e.to_string()))?;

        Ok(Arc::new(config))
    }

    /// Serving network side.
    pub fn build_client_config(&self) -> Result<Arc<ClientConfig>, IoError> {
        let (cert_chain, key) = self.load_identity()?;

        let config = ClientConfig::builder()
            .with_root_certificates(self.load_roots()?)
            .with_client_auth_cert(cert_chain, key)
            .map_err(|e| IoError::new(ErrorKind::InvalidInput, e.to_string()))?;

        Ok(Arc::new(config))
    }

    pub fn server_name(&self) -> Result<ServerName<'static>, IoError> {
        ServerName::try_from(self.server_name.clone())
            .map_err(|e| IoError::new(ErrorKind::InvalidInput, format!("Invalid server name: {}", e)))
    }
}
