use std::{
    fmt,
    io::{BufReader, Cursor},
};

use der::{asn1::Ia5String, Decode as _, Encode as _};
use time::OffsetDateTime;
use x509_cert::{
    builder::{Builder, RequestBuilder as CsrBuilder},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Make a P-256 private key (from which we can derive a public key).
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// Creates a CSR with `domains` and signs it with `signer`.
///
/// The first item of `domains` is picked for the CSR's Common Name (CN). All domains are added to a
/// Subject Alternative Name (SAN) extension.
pub(crate) fn create_csr(
    signer: &p256::ecdsa::SigningKey,
    domains: &[&str],
) -> Result<x509_cert::request::CertReq> {
    let primary_domain = domains
        .first()
        .ok_or_else(|| Error::Order("a CSR needs at least one domain".to_owned()))?;

    let subject = format!("CN={primary_domain}")
        .parse::<Name>()
        .map_err(csr_error)?;

    let mut csr = CsrBuilder::new(subject, signer).map_err(csr_error)?;

    let names = domains
        .iter()
        .map(|domain| Ia5String::new(domain).map(GeneralName::DnsName))
        .collect::<der::Result<Vec<_>>>()
        .map_err(csr_error)?;
    csr.add_extension(&SubjectAltName(names))
        .map_err(csr_error)?;

    csr.build::<p256::ecdsa::DerSignature>().map_err(csr_error)
}

/// DER encoded CSR for `domains`, signed by `signer`, as accepted by
/// [`CsrOrder::finalize`](crate::order::CsrOrder::finalize).
pub fn create_csr_der(signer: &p256::ecdsa::SigningKey, domains: &[&str]) -> Result<Vec<u8>> {
    create_csr(signer, domains)?.to_der().map_err(csr_error)
}

fn csr_error(err: impl fmt::Display) -> Error {
    Error::Order(format!("could not build CSR: {err}"))
}

/// An issued certificate chain.
#[derive(Clone)]
pub struct Certificate {
    domain: String,
    chain: Vec<u8>,
    private_key: Option<Zeroizing<String>>,
    issuer_url: Option<String>,
}

impl Certificate {
    pub(crate) fn new(
        domain: String,
        chain: Vec<u8>,
        private_key: Option<Zeroizing<String>>,
        issuer_url: Option<String>,
    ) -> Self {
        Certificate {
            domain,
            chain,
            private_key,
            issuer_url,
        }
    }

    /// Primary domain of the order the certificate was issued for.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The chain exactly as downloaded.
    pub fn chain(&self) -> &[u8] {
        &self.chain
    }

    /// The issued certificate chain in PEM format, end-entity certificate first.
    pub fn certificate_pem(&self) -> Result<&str> {
        std::str::from_utf8(&self.chain)
            .map_err(|err| Error::MalformedResponse(format!("certificate chain is not PEM: {err}")))
    }

    /// The issued certificate chain in DER format.
    pub fn certificate_chain(&self) -> Result<Vec<Vec<u8>>> {
        let mut rdr = BufReader::new(Cursor::new(&self.chain));

        rustls_pemfile::certs(&mut rdr)
            .map(|res| res.map(|cert| cert.to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Error::MalformedResponse(format!("reading certificate chain: {err}")))
    }

    /// PKCS#8 PEM of the certificate key, when the order was finalized with
    /// [`finalize_with_key`](crate::order::CsrOrder::finalize_with_key).
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref().map(String::as_str)
    }

    /// URL of the issuer certificate, from the `Link: rel="up"` header of the download.
    pub fn issuer_url(&self) -> Option<&str> {
        self.issuer_url.as_deref()
    }

    /// Inspect the certificate to count the number of (whole) valid days left.
    ///
    /// It's up to the ACME API provider to decide how long an issued certificate is valid.
    /// Let's Encrypt sets the validity to 90 days. This function reports 89 days for newly
    /// issued cert, since it counts _whole_ days.
    ///
    /// It is possible to get negative days for an expired certificate.
    pub fn valid_days_left(&self) -> Result<i64> {
        let cert_chain = self.certificate_chain()?;
        let cert_ee = cert_chain
            .first() // EE cert is first
            .ok_or_else(|| Error::MalformedResponse("no certificates in chain".to_owned()))?;

        let cert = x509_cert::Certificate::from_der(cert_ee)
            .map_err(|err| Error::MalformedResponse(format!("parsing certificate: {err}")))?;

        let not_after = OffsetDateTime::UNIX_EPOCH
            + cert.tbs_certificate.validity.not_after.to_unix_duration();

        Ok((not_after - OffsetDateTime::now_utc()).whole_days())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("domain", &self.domain)
            .field("issuer_url", &self.issuer_url)
            .field("has_private_key", &self.private_key.is_some())
            .finish_non_exhaustive()
    }
}
