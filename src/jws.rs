//! See [RFC 8555 §6.2](https://datatracker.ietf.org/doc/html/rfc8555#section-6.2).

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{acc::thumbprint_digest, error::Result, AccountKey};

/// JWT Protected Header scheme as defined in [RFC 8555 §6.2].
///
/// > For newAccount requests, and for revokeCert requests authenticated by a certificate key,
/// there MUST be a "jwk" field. This field MUST contain the public key corresponding to the
/// private key used to sign the JWS.
/// >
/// > For all other requests, the request is signed using an existing account, and there MUST be a
/// "kid" field. This field MUST contain the account URL received by POSTing to the newAccount
/// resource.
///
/// [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2
#[derive(Debug, Serialize, Deserialize, Default)]
pub(crate) struct JwsProtectedHeader {
    /// Algorithm.
    ///
    /// Either "ES256" or "RS256", matching the account key.
    alg: String,

    /// A unique value that enables the verifier of a JWS to recognize when replay has occurred.
    ///
    /// As defined in [RFC 8555 §6.5].
    ///
    /// [RFC 8555 §6.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.5
    nonce: String,

    /// Defined in [RFC 8555 §6.4].
    ///
    /// [RFC 8555 §6.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.4
    url: String,

    /// JSON Web Key.
    ///
    /// Mutually exclusive with `kid` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,

    /// Key ID.
    ///
    /// Mutually exclusive with `jwk` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl JwsProtectedHeader {
    pub(crate) fn new_jwk(key: &AccountKey, url: &str, nonce: String) -> Self {
        JwsProtectedHeader {
            alg: key.alg().to_owned(),
            url: url.to_owned(),
            nonce,
            jwk: Some(key.jwk()),
            ..Default::default()
        }
    }

    pub(crate) fn new_kid(key: &AccountKey, kid: &str, url: &str, nonce: String) -> Self {
        JwsProtectedHeader {
            alg: key.alg().to_owned(),
            url: url.to_owned(),
            nonce,
            kid: Some(kid.to_owned()),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn nonce(&self) -> &str {
        &self.nonce
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum Jwk {
    Ec {
        alg: String,
        crv: String,
        kty: String,
        #[serde(rename = "use")]
        _use: String,
        x: String,
        y: String,
    },
    Rsa {
        alg: String,
        e: String,
        kty: String,
        n: String,
    },
}

impl Jwk {
    pub(crate) fn ec(x: String, y: String) -> Self {
        Jwk::Ec {
            alg: "ES256".to_owned(),
            kty: "EC".to_owned(),
            crv: "P-256".to_owned(),
            _use: "sig".to_owned(),
            x,
            y,
        }
    }

    pub(crate) fn rsa(e: String, n: String) -> Self {
        Jwk::Rsa {
            alg: "RS256".to_owned(),
            kty: "RSA".to_owned(),
            e,
            n,
        }
    }
}

/// Required members of a JWK, as hashed for an [RFC 7638] thumbprint.
///
/// [RFC 7638]: https://datatracker.ietf.org/doc/html/rfc7638
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
// LEXICAL ORDER OF FIELDS MATTER!
pub(crate) enum JwkThumb {
    Ec {
        crv: String,
        kty: String,
        x: String,
        y: String,
    },
    Rsa {
        e: String,
        kty: String,
        n: String,
    },
}

impl JwkThumb {
    pub(crate) fn thumbprint(&self) -> Result<String> {
        let jwk_json = serde_json::to_string(self)?;
        Ok(thumbprint_digest(&jwk_json))
    }
}

impl From<&Jwk> for JwkThumb {
    fn from(a: &Jwk) -> Self {
        match a {
            Jwk::Ec { crv, kty, x, y, .. } => JwkThumb::Ec {
                crv: crv.clone(),
                kty: kty.clone(),
                x: x.clone(),
                y: y.clone(),
            },
            Jwk::Rsa { e, kty, n, .. } => JwkThumb::Rsa {
                e: e.clone(),
                kty: kty.clone(),
                n: n.clone(),
            },
        }
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FlattenedJsonJws {
    protected: String,
    payload: String,
    signature: String,
}

impl FlattenedJsonJws {
    pub(crate) fn new(protected: String, payload: String, signature: String) -> Self {
        FlattenedJsonJws {
            protected,
            payload,
            signature,
        }
    }

    #[cfg(test)]
    pub(crate) fn protected_header(&self) -> Result<JwsProtectedHeader> {
        let json = BASE64_URL_SAFE_NO_PAD
            .decode(&self.protected)
            .map_err(|err| crate::Error::MalformedResponse(err.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }

    #[cfg(test)]
    pub(crate) fn payload(&self) -> &str {
        &self.payload
    }
}

/// Construct JWS with protected header according to [RFC 7515 §5.1].
///
/// An empty `payload` produces the empty payload string used by POST-as-GET requests.
///
/// [RFC 7515 §5.1]: https://datatracker.ietf.org/doc/html/rfc7515#section-5.1
pub(crate) fn jws_with(
    protected: JwsProtectedHeader,
    key: &AccountKey,
    payload: &[u8],
) -> Result<FlattenedJsonJws> {
    let header = {
        let pro_json = serde_json::to_string(&protected)?;
        BASE64_URL_SAFE_NO_PAD.encode(pro_json)
    };

    let payload = BASE64_URL_SAFE_NO_PAD.encode(payload);

    let to_sign = format!("{header}.{payload}");
    let signature = BASE64_URL_SAFE_NO_PAD.encode(key.sign(to_sign.as_bytes()));

    Ok(FlattenedJsonJws::new(header, payload, signature))
}
