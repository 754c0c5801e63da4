use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use eyre::WrapErr as _;
use parking_lot::Mutex;
use rcgen::{CertificateParams, CustomExtension, KeyPair};
use zeroize::Zeroizing;

use super::{Solver, SolverChallenge};

/// ALPN protocol name a validating server negotiates.
pub const ACME_TLS_ALPN_NAME: &[u8] = b"acme-tls/1";

/// Validation certificate for one domain.
#[derive(Clone)]
pub struct AlpnCertificate {
    /// Self-signed certificate in DER.
    pub cert_der: Vec<u8>,

    /// PKCS#8 DER private key of the certificate.
    pub key_der: Zeroizing<Vec<u8>>,

    /// SHA-256 of the key authorization carried in the `acmeIdentifier` extension.
    pub digest: [u8; 32],
}

impl fmt::Debug for AlpnCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlpnCertificate")
            .field("cert_der_len", &self.cert_der.len())
            .finish_non_exhaustive()
    }
}

/// Validation certificates by domain, shared with the TLS acceptor.
///
/// A TLS server answering `acme-tls/1` handshakes looks up the SNI name here and presents the
/// certificate found.
#[derive(Debug, Clone, Default)]
pub struct TlsAlpnCertificates {
    certs: Arc<Mutex<HashMap<String, AlpnCertificate>>>,
}

impl TlsAlpnCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str) -> Option<AlpnCertificate> {
        self.certs.lock().get(domain).cloned()
    }

    pub fn len(&self) -> usize {
        self.certs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.lock().is_empty()
    }
}

/// Solves `tls-alpn-01` challenges by generating validation certificates.
///
/// Each certificate names the domain as its only dNSName and carries the critical `acmeIdentifier`
/// extension (OID 1.3.6.1.5.5.7.1.31) with the key authorization digest. See [RFC 8737 §3].
///
/// [RFC 8737 §3]: https://datatracker.ietf.org/doc/html/rfc8737#section-3
#[derive(Debug, Clone, Default)]
pub struct TlsAlpn01Solver {
    certs: TlsAlpnCertificates,
}

impl TlsAlpn01Solver {
    pub fn new(certs: TlsAlpnCertificates) -> Self {
        TlsAlpn01Solver { certs }
    }

    pub fn certificates(&self) -> &TlsAlpnCertificates {
        &self.certs
    }
}

fn validation_certificate(domain: &str, digest: [u8; 32]) -> eyre::Result<AlpnCertificate> {
    let key_pair = KeyPair::generate()?;

    let mut params = CertificateParams::new(vec![domain.to_owned()])?;
    params.custom_extensions = vec![CustomExtension::new_acme_identifier(&digest)];

    let cert = params.self_signed(&key_pair)?;

    Ok(AlpnCertificate {
        cert_der: cert.der().to_vec(),
        key_der: Zeroizing::new(key_pair.serialize_der()),
        digest,
    })
}

#[async_trait]
impl Solver for TlsAlpn01Solver {
    fn can_solve(&self, challenge_type: &str) -> bool {
        challenge_type == "tls-alpn-01"
    }

    async fn present(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        let digest = challenge.key_authorization.digest();

        let current = self.certs.get(domain);
        if current.is_some_and(|cert| cert.digest == digest) {
            return Ok(());
        }

        let cert = validation_certificate(domain, digest)
            .wrap_err_with(|| format!("generating tls-alpn-01 certificate for {domain}"))?;

        self.certs.certs.lock().insert(domain.to_owned(), cert);

        log::debug!("Published tls-alpn-01 certificate for {domain}");
        Ok(())
    }

    async fn clean_up(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        let digest = challenge.key_authorization.digest();

        let mut certs = self.certs.certs.lock();
        if certs.get(domain).is_some_and(|cert| cert.digest == digest) {
            certs.remove(domain);
        }

        Ok(())
    }
}
