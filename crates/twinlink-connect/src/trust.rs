//! ---
//! twl_section: "02-asset-connectivity"
//! twl_subsection: "module"
//! twl_type: "source"
//! twl_scope: "code"
//! twl_description: "Protocol-agnostic asset connectivity providers."
//! twl_version: "v0.0.0-prealpha"
//! twl_owner: "tbd"
//! ---
//! Trust-on-first-use certificate handling. Assets on factory networks
//! frequently present self-signed certificates; instead of disabling
//! verification wholesale, the first certificate a peer presents is admitted
//! and pinned, and any later change is treated as a failure.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::transport::{WireRequest, WireResponse};
use crate::{AssetConnectionError, Result};

/// Persistent store of admitted peer-certificate fingerprints.
///
/// The store file holds one lowercase hex SHA-256 fingerprint per line and
/// is rewritten on every admission. One store serves one peer endpoint; the
/// first-use admission rule relies on the store starting out empty.
#[derive(Debug)]
pub struct CertificateTrustHandler {
    path: PathBuf,
    fingerprints: RwLock<BTreeSet<String>>,
}

impl CertificateTrustHandler {
    /// Open the store at `path`, creating an empty store file when none
    /// exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<CertificateTrustHandler> {
        let path = path.into();
        let fingerprints = match std::fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::write(&path, "")?;
                BTreeSet::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(CertificateTrustHandler {
            path,
            fingerprints: RwLock::new(fingerprints),
        })
    }

    /// SHA-256 fingerprint of a DER-encoded certificate.
    pub fn fingerprint(certificate: &[u8]) -> String {
        hex::encode(Sha256::digest(certificate))
    }

    /// Whether the certificate has been admitted before.
    pub fn is_trusted(&self, certificate: &[u8]) -> bool {
        self.fingerprints
            .read()
            .contains(&Self::fingerprint(certificate))
    }

    /// Admit a certificate and persist the store.
    pub fn trust(&self, certificate: &[u8]) -> Result<()> {
        let fingerprint = Self::fingerprint(certificate);
        let mut fingerprints = self.fingerprints.write();
        if fingerprints.insert(fingerprint.clone()) {
            let mut contents = String::new();
            for line in fingerprints.iter() {
                contents.push_str(line);
                contents.push('\n');
            }
            std::fs::write(&self.path, contents)?;
            info!(%fingerprint, store = %self.path.display(), "peer certificate admitted");
        }
        Ok(())
    }

    /// Number of admitted certificates.
    pub fn len(&self) -> usize {
        self.fingerprints.read().len()
    }

    /// Whether no certificate has been admitted yet.
    pub fn is_empty(&self) -> bool {
        self.fingerprints.read().is_empty()
    }

    /// Store file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the store file. Tolerates a store that was never written.
    pub fn close(self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// TLS certificate verifier enforcing trust-on-first-use pinning.
///
/// On an empty store the first certificate the peer presents is admitted
/// and persisted; afterwards only admitted certificates complete the
/// handshake, so a peer certificate change fails the connection. The pinned
/// certificate itself is the trust anchor, which is why signature checks
/// against a chain are not performed.
#[derive(Debug)]
pub struct PinnedCertificateVerifier {
    handler: CertificateTrustHandler,
}

impl PinnedCertificateVerifier {
    /// Verifier backed by the given trust store.
    pub fn new(handler: CertificateTrustHandler) -> PinnedCertificateVerifier {
        PinnedCertificateVerifier { handler }
    }

    fn admit_or_reject(&self, certificate: &[u8]) -> Result<()> {
        if self.handler.is_trusted(certificate) {
            return Ok(());
        }
        if self.handler.is_empty() {
            return self.handler.trust(certificate);
        }
        Err(AssetConnectionError::Connection(
            "peer certificate changed after first use".into(),
        ))
    }
}

impl ServerCertVerifier for PinnedCertificateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        self.admit_or_reject(end_entity.as_ref())
            .map(|()| ServerCertVerified::assertion())
            .map_err(|error| {
                warn!(%error, "peer certificate rejected");
                rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
            })
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}

/// Client able to report the certificate its peer presented.
#[async_trait]
pub trait SecureClient: Send + Sync {
    /// Execute one request.
    async fn send(&self, request: WireRequest) -> Result<WireResponse>;

    /// DER-encoded certificate of the peer from the most recent handshake
    /// attempt, where the protocol exposes one.
    fn peer_certificate(&self) -> Option<Vec<u8>>;
}

/// Wrapper adding trust-on-first-use semantics to a [`SecureClient`].
///
/// A request failing while the store is still empty admits the presented
/// certificate and retries exactly once. Once anything is pinned, failures
/// propagate: an unseen certificate at that point means the peer changed
/// its certificate.
pub struct TrustOnFirstUseClient<C> {
    inner: C,
    handler: CertificateTrustHandler,
}

impl<C: SecureClient> TrustOnFirstUseClient<C> {
    /// Wrap a client with the given trust store.
    pub fn new(inner: C, handler: CertificateTrustHandler) -> TrustOnFirstUseClient<C> {
        TrustOnFirstUseClient { inner, handler }
    }

    /// Execute a request, admitting the peer certificate on a first-contact
    /// failure.
    pub async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let error = match self.inner.send(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };
        if !matches!(error, AssetConnectionError::Connection(_)) {
            return Err(error);
        }
        let Some(certificate) = self.inner.peer_certificate() else {
            return Err(error);
        };
        if self.handler.is_trusted(&certificate) {
            warn!("request failed on an already admitted peer certificate");
            return Err(error);
        }
        if !self.handler.is_empty() {
            warn!("peer presented a different certificate than the pinned one");
            return Err(error);
        }
        self.handler.trust(&certificate)?;
        self.inner.send(request).await
    }

    /// The trust store behind this client.
    pub fn handler(&self) -> &CertificateTrustHandler {
        &self.handler
    }

    /// Tear the wrapper down and remove the trust store.
    pub fn close(self) -> Result<()> {
        self.handler.close()
    }
}
