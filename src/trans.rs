use serde::Serialize;

use crate::{
    error::Result,
    req::{HttpClient, Response},
    signer::Signer,
    AccountKey,
};

/// Signed request plumbing for calls against the API.
///
/// Setup is:
///
/// 1. `Transport::new()`
/// 2. `post_raw()` against newAccount url, signed with the embedded JWK
/// 3. `set_key_id` from the returned `Location` header.
/// 4. `post()` / `post_as_get()` for all calls after that, signed with the key ID.
///
/// A rejected request is never retried; the problem is handed back to the caller.
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    http: HttpClient,
    signer: Signer,
}

impl Transport {
    pub(crate) fn new(http: HttpClient, signer: Signer) -> Self {
        Transport { http, signer }
    }

    /// Update the key ID once it is known (part of setting up the transport).
    pub(crate) fn set_key_id(&mut self, kid: String) {
        self.signer.set_key_id(kid);
    }

    /// The key used in the transport.
    pub(crate) fn acme_key(&self) -> &AccountKey {
        self.signer.key()
    }

    /// Posts `body` as JSON and turns error statuses into [`Error::Protocol`].
    ///
    /// [`Error::Protocol`]: crate::Error::Protocol
    pub(crate) async fn post<T>(&self, url: &str, body: &T) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        self.post_raw(url, &payload).await?.into_result()
    }

    /// POST-as-GET: a signed request with an empty payload.
    pub(crate) async fn post_as_get(&self, url: &str) -> Result<Response> {
        self.post_raw(url, b"").await?.into_result()
    }

    /// Signs and posts `payload`, returning the response whatever its status.
    pub(crate) async fn post_raw(&self, url: &str, payload: &[u8]) -> Result<Response> {
        let body = self.signer.sign(url, payload).await?;

        log::debug!("Call endpoint: {url}");
        let res = self.http.post_jose(url, body).await?;

        // Regardless of the request being a success or not, there might be a nonce in the
        // response.
        self.signer.nonce_pool().harvest(&res);

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{error::Error, nonce::NoncePool, test, Config};

    fn transport(server: &test::TestServer) -> Transport {
        let http = HttpClient::new(&Config::default()).unwrap();
        let pool = Arc::new(NoncePool::new(
            &format!("{}/acme/new-nonce", server.url),
            http.clone(),
        ));
        Transport::new(http, Signer::new(pool, AccountKey::generate()))
    }

    #[tokio::test]
    async fn test_error_response_still_yields_a_nonce() {
        let server = test::with_acme_server(test::Scenario {
            rate_limit_new_order: true,
            ..Default::default()
        });
        let transport = transport(&server);

        let url = format!("{}/acme/new-order", server.url);
        let err = transport
            .post(&url, &crate::api::Order::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { status: 429, .. }), "{err:?}");

        // the 429 carried a nonce, so the next request needs no HEAD
        transport.post_raw(&url, b"{}").await.unwrap();
        assert_eq!(server.state().nonce_requests, 1);
    }
}
