use std::fmt;

use base64::prelude::*;
use p256::ecdsa::signature::Signer as _;
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use rsa::{
    pkcs1::DecodeRsaPrivateKey as _,
    signature::{SignatureEncoding as _, Signer as _},
    traits::PublicKeyParts as _,
    RsaPrivateKey,
};
use sha2::{Digest as _, Sha256};
use zeroize::Zeroizing;

use crate::{
    error::{Error, Result},
    jws::{Jwk, JwkThumb},
};

/// Smallest RSA modulus accepted for an account key.
pub const MIN_RSA_BITS: usize = 2048;

/// Key pair identifying an ACME account and signing every request made on its behalf.
///
/// Both elliptic curve P-256 (`ES256`, the default) and RSA (`RS256`) keys are supported. Keys are
/// checked once when constructed; a key that makes it into an `AccountKey` is always usable.
#[derive(Clone)]
pub struct AccountKey {
    inner: KeyPair,
}

#[derive(Clone)]
enum KeyPair {
    Ecdsa(p256::ecdsa::SigningKey),
    Rsa {
        private_key: RsaPrivateKey,
        signing_key: rsa::pkcs1v15::SigningKey<Sha256>,
    },
}

impl AccountKey {
    /// Generates a fresh P-256 key.
    pub fn generate() -> AccountKey {
        Self::from_p256(crate::create_p256_key())
    }

    /// Wraps an existing P-256 signing key.
    pub fn from_p256(signing_key: p256::ecdsa::SigningKey) -> AccountKey {
        AccountKey {
            inner: KeyPair::Ecdsa(signing_key),
        }
    }

    /// Wraps an existing RSA key after checking its size and consistency.
    pub fn from_rsa(private_key: RsaPrivateKey) -> Result<AccountKey> {
        let bits = private_key.n().bits();
        if bits < MIN_RSA_BITS {
            return Err(Error::Key(format!(
                "RSA modulus is {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }

        private_key
            .validate()
            .map_err(|err| Error::Key(format!("RSA key failed validation: {err}")))?;

        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());

        Ok(AccountKey {
            inner: KeyPair::Rsa {
                private_key,
                signing_key,
            },
        })
    }

    /// Reads a key from PEM.
    ///
    /// Accepts PKCS#8 (P-256 or RSA) and PKCS#1 (RSA) documents.
    pub fn from_pem(pem: &str) -> Result<AccountKey> {
        if let Ok(signing_key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self::from_p256(signing_key));
        }

        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|err| Error::Key(format!("unsupported or unreadable private key: {err}")))?;

        Self::from_rsa(private_key)
    }

    /// The private key as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        let pem = match &self.inner {
            KeyPair::Ecdsa(signing_key) => signing_key.to_pkcs8_pem(pem::LineEnding::LF),
            KeyPair::Rsa { private_key, .. } => private_key.to_pkcs8_pem(pem::LineEnding::LF),
        };

        pem.map_err(|err| Error::Key(format!("could not encode private key: {err}")))
    }

    /// JWS algorithm name used in the protected header.
    pub fn alg(&self) -> &'static str {
        match &self.inner {
            KeyPair::Ecdsa(_) => "ES256",
            KeyPair::Rsa { .. } => "RS256",
        }
    }

    /// The public half of the key as a JWK.
    pub(crate) fn jwk(&self) -> Jwk {
        match &self.inner {
            KeyPair::Ecdsa(signing_key) => {
                let point = signing_key.verifying_key().to_encoded_point(false);

                // uncompressed points always carry both coordinates
                let x = point.x().map(|x| BASE64_URL_SAFE_NO_PAD.encode(x));
                let y = point.y().map(|y| BASE64_URL_SAFE_NO_PAD.encode(y));

                Jwk::ec(x.unwrap_or_default(), y.unwrap_or_default())
            }

            KeyPair::Rsa { private_key, .. } => Jwk::rsa(
                BASE64_URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
                BASE64_URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            ),
        }
    }

    /// RFC 7638 thumbprint of the public key, base64url encoded.
    pub fn thumbprint(&self) -> Result<String> {
        JwkThumb::from(&self.jwk()).thumbprint()
    }

    /// Signs `message` with the algorithm reported by [`alg`](Self::alg).
    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.inner {
            KeyPair::Ecdsa(signing_key) => {
                let signature: p256::ecdsa::Signature = signing_key.sign(message);
                signature.to_bytes().to_vec()
            }

            KeyPair::Rsa { signing_key, .. } => signing_key.sign(message).to_vec(),
        }
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("alg", &self.alg())
            .finish_non_exhaustive()
    }
}

/// Computes the RFC 7638 thumbprint digest of a canonical JWK.
pub(crate) fn thumbprint_digest(canonical_json: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(canonical_json))
}
