use std::sync::Arc;

use crate::{
    error::Result,
    jws::{jws_with, JwsProtectedHeader},
    nonce::NoncePool,
    AccountKey,
};

/// Produces signed JWS envelopes for one account.
///
/// Every envelope consumes exactly one nonce from the shared pool.
#[derive(Clone, Debug)]
pub(crate) struct Signer {
    key: AccountKey,

    /// Set once we contacted the ACME API to figure out the key ID.
    key_id: Option<String>,

    nonce_pool: Arc<NoncePool>,
}

impl Signer {
    pub(crate) fn new(nonce_pool: Arc<NoncePool>, key: AccountKey) -> Self {
        Signer {
            key,
            key_id: None,
            nonce_pool,
        }
    }

    pub(crate) fn key(&self) -> &AccountKey {
        &self.key
    }

    pub(crate) fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub(crate) fn set_key_id(&mut self, kid: String) {
        self.key_id = Some(kid);
    }

    pub(crate) fn nonce_pool(&self) -> &NoncePool {
        &self.nonce_pool
    }

    /// Signs `payload` for delivery to `url`.
    ///
    /// Uses the account URL as `kid` once known, the public key as `jwk` before that.
    pub(crate) async fn sign(&self, url: &str, payload: &[u8]) -> Result<String> {
        let nonce = self.nonce_pool.take().await?;

        let protected = match &self.key_id {
            Some(kid) => JwsProtectedHeader::new_kid(&self.key, kid, url, nonce),
            None => JwsProtectedHeader::new_jwk(&self.key, url, nonce),
        };

        let jws = jws_with(protected, &self.key, payload)?;
        Ok(serde_json::to_string(&jws)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{req::HttpClient, Config};

    fn signer() -> Signer {
        let http = HttpClient::new(&Config::default()).unwrap();
        let pool = Arc::new(NoncePool::new("http://127.0.0.1:9/nonce", http));
        Signer::new(pool, AccountKey::generate())
    }

    #[tokio::test]
    async fn test_sign_consumes_exactly_one_nonce() {
        let signer = signer();
        for n in 0..3 {
            signer.nonce_pool().push(format!("nonce-{n}"));
        }

        signer.sign("https://ca/new-order", b"{}").await.unwrap();
        assert_eq!(signer.nonce_pool().len(), 2);

        signer.sign("https://ca/order/1", b"").await.unwrap();
        assert_eq!(signer.nonce_pool().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_signers_never_share_a_nonce() {
        let signer = signer();
        for n in 0..16 {
            signer.nonce_pool().push(format!("nonce-{n}"));
        }

        let tasks = (0..16)
            .map(|_| {
                let signer = signer.clone();
                tokio::spawn(async move {
                    let body = signer.sign("https://ca/x", b"").await.unwrap();
                    let jws = serde_json::from_str::<crate::jws::FlattenedJsonJws>(&body).unwrap();
                    jws.protected_header().unwrap().nonce().to_owned()
                })
            })
            .collect::<Vec<_>>();

        let mut nonces = Vec::new();
        for task in tasks {
            nonces.push(task.await.unwrap());
        }
        nonces.sort();
        nonces.dedup();

        assert_eq!(nonces.len(), 16);
        assert_eq!(signer.nonce_pool().len(), 0);
    }

    #[tokio::test]
    async fn test_key_id_switches_header_to_kid() {
        let mut signer = signer();
        signer.nonce_pool().push("n".to_owned());
        signer.set_key_id("https://ca/acct/7".to_owned());
        assert_eq!(signer.key_id(), Some("https://ca/acct/7"));

        let body = signer.sign("https://ca/x", b"").await.unwrap();
        assert!(body.contains("\"protected\""));
        assert!(body.contains("\"signature\""));
    }
}
