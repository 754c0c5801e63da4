use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    req::{HttpClient, Response},
};

/// Shared pool of server issued replay nonces.
///
/// One pool serves every signer of a session. Taking a nonce removes it under the lock, so no
/// nonce is ever handed out twice.
#[derive(Debug)]
pub(crate) struct NoncePool {
    nonce_url: String,
    http: HttpClient,
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    pub(crate) fn new(nonce_url: &str, http: HttpClient) -> Self {
        NoncePool {
            nonce_url: nonce_url.to_owned(),
            http,
            pool: Mutex::new(VecDeque::new()),
        }
    }

    /// Adds the response's `Replay-Nonce`, if any, whatever its status.
    pub(crate) fn harvest(&self, res: &Response) {
        if let Some(nonce) = &res.nonce {
            self.push(nonce.clone());
        }
    }

    pub(crate) fn push(&self, nonce: String) {
        // TODO: ignore invalid replay-nonce values
        // see https://datatracker.ietf.org/doc/html/rfc8555#section-6.5.1
        log::trace!("Extracting new nonce");
        self.pool.lock().push_back(nonce);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Takes a pooled nonce, or fetches a fresh one from the newNonce resource.
    pub(crate) async fn take(&self) -> Result<String> {
        let pooled = self.pool.lock().pop_front();
        if let Some(nonce) = pooled {
            log::trace!("Use previous nonce");
            return Ok(nonce);
        }

        log::debug!("Request new nonce");
        self.fetch()
            .await
            .map_err(|err| Error::Nonce(Box::new(err)))
    }

    async fn fetch(&self) -> Result<String> {
        let res = self.http.head(&self.nonce_url).await?.into_result()?;

        res.nonce.ok_or_else(|| {
            Error::MalformedResponse("newNonce response without Replay-Nonce header".to_owned())
        })
    }
}
