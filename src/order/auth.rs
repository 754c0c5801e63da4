use std::{marker::PhantomData, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    acc::AccountInner,
    api,
    error::{Error, Result},
    poll::poll_until,
    solver::KeyAuthorization,
};

/// An authorization ([ownership proof]) for a domain name.
///
/// Each authorization for an order much be progressed to a valid state before the ACME API
/// will issue a certificate.
///
/// Authorizations may or may not be required depending on previous orders against the same
/// ACME account. The ACME API decides if the authorization is needed.
///
/// [`NewOrder::wait_ready`] handles authorizations through registered solvers. This type is for
/// callers that want to provision proofs themselves, one challenge at a time.
///
/// [ownership proof]: crate#domain-ownership
/// [`NewOrder::wait_ready`]: crate::order::NewOrder::wait_ready
#[derive(Debug)]
pub struct Auth {
    inner: Arc<AccountInner>,
    api_auth: api::Authorization,
    auth_url: String,
}

impl Auth {
    pub(crate) fn new(
        inner: &Arc<AccountInner>,
        api_auth: api::Authorization,
        auth_url: &str,
    ) -> Self {
        Auth {
            inner: Arc::clone(inner),
            api_auth,
            auth_url: auth_url.to_owned(),
        }
    }

    /// Domain name for this authorization.
    pub fn domain_name(&self) -> &str {
        &self.api_auth.identifier.value
    }

    /// Whether we actually need to do the authorization. This might not be needed if we have
    /// proven ownership of the domain recently in a previous order.
    pub fn need_challenge(&self) -> bool {
        !matches!(self.api_auth.status, api::AuthorizationStatus::Valid)
    }

    /// Get the http challenge.
    ///
    /// The http challenge must be placed so it is accessible under:
    ///
    /// ```text
    /// http://<domain-to-be-proven>/.well-known/acme-challenge/<token>
    /// ```
    ///
    /// ```no_run
    /// use acme::order::Auth;
    ///
    /// async fn web_authorize(auth: &Auth) -> acme::Result<()> {
    ///     let challenge = auth.http_challenge().unwrap();
    ///
    ///     // Assuming our web server's root is under /var/www
    ///     let path = format!("/var/www/.well-known/acme-challenge/{}", challenge.http_token());
    ///     std::fs::write(&path, challenge.http_proof()?).unwrap();
    ///
    ///     challenge.validate().await
    /// }
    /// ```
    pub fn http_challenge(&self) -> Option<Challenge<Http>> {
        self.api_auth
            .http_challenge()
            .map(|c| Challenge::new(&self.inner, c.clone(), &self.auth_url))
    }

    /// Get the dns challenge.
    ///
    /// The dns challenge is a `TXT` record that must put created under:
    ///
    /// ```text
    /// _acme-challenge.<domain-to-be-proven>.  TXT  <proof>
    /// ```
    ///
    /// The dns proof is not the same as the http proof.
    pub fn dns_challenge(&self) -> Option<Challenge<Dns>> {
        self.api_auth
            .dns_challenge()
            .map(|c| Challenge::new(&self.inner, c.clone(), &self.auth_url))
    }

    /// Returns the TLS ALPN challenge.
    ///
    /// The certificate served for `acme-tls/1` handshakes must carry the domain as its only
    /// dNSName and the [proof](Challenge::tls_alpn_proof) in a critical `acmeIdentifier`
    /// extension. [`TlsAlpn01Solver`](crate::solver::TlsAlpn01Solver) builds such certificates.
    pub fn tls_alpn_challenge(&self) -> Option<Challenge<TlsAlpn>> {
        self.api_auth
            .tls_alpn_challenge()
            .map(|c| Challenge::new(&self.inner, c.clone(), &self.auth_url))
    }

    /// Returns a reference to the authorization's API object.
    ///
    /// Not refreshed when a challenge is validated.
    pub fn api_auth(&self) -> &api::Authorization {
        &self.api_auth
    }
}

/// Marker type for HTTP challenges.
#[doc(hidden)]
#[derive(Debug)]
pub struct Http;

/// Marker type for DNS challenges.
#[doc(hidden)]
#[derive(Debug)]
pub struct Dns;

/// Marker type for TLS ALPN challenges.
#[doc(hidden)]
#[derive(Debug)]
pub struct TlsAlpn;

/// A DNS, HTTP, or TLS-ALPN challenge as obtained from the [`Auth`].
#[derive(Debug)]
pub struct Challenge<A> {
    inner: Arc<AccountInner>,
    api_challenge: api::Challenge,
    auth_url: String,
    _ph: PhantomData<A>,
}

/// See [RFC 8555 §8.3].
///
/// [RFC 8555 §8.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.3
impl Challenge<Http> {
    /// Returns the token, used as the file name of the proof.
    pub fn http_token(&self) -> &str {
        &self.api_challenge.token
    }

    /// Returns the proof content for HTTP validation.
    pub fn http_proof(&self) -> Result<String> {
        Ok(self.key_authorization()?.as_str().to_owned())
    }
}

/// See [RFC 8555 §8.4].
///
/// [RFC 8555 §8.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.4
impl Challenge<Dns> {
    /// Returns the value of the `TXT` record.
    pub fn dns_proof(&self) -> Result<String> {
        Ok(self.key_authorization()?.dns_value())
    }
}

/// See [RFC 8737 §3].
///
/// [RFC 8737 §3]: https://datatracker.ietf.org/doc/html/rfc8737#section-3
impl Challenge<TlsAlpn> {
    /// Returns the SHA-256 digest carried by the validation certificate.
    pub fn tls_alpn_proof(&self) -> Result<[u8; 32]> {
        Ok(self.key_authorization()?.digest())
    }
}

impl<A> Challenge<A> {
    fn new(inner: &Arc<AccountInner>, api_challenge: api::Challenge, auth_url: &str) -> Self {
        Challenge {
            inner: Arc::clone(inner),
            api_challenge,
            auth_url: auth_url.to_owned(),
            _ph: PhantomData,
        }
    }

    fn key_authorization(&self) -> Result<KeyAuthorization> {
        KeyAuthorization::for_key(&self.api_challenge.token, self.inner.transport.acme_key())
    }

    /// Returns true if this challenge needs validation.
    ///
    /// It might already been done in a previous order for the same account.
    pub fn need_validate(&self) -> bool {
        self.api_challenge.is_pending()
    }

    /// Tells the ACME API to attempt to validate the proof of this challenge, then waits for the
    /// authorization to be decided.
    ///
    /// The challenge proof must be put in place before this call.
    pub async fn validate(&self) -> Result<()> {
        self.inner
            .transport
            .post(&self.api_challenge.url, &api::EmptyObject)
            .await?;

        let inner = &self.inner;
        let auth_url = self.auth_url.as_str();

        let auth = poll_until(
            &inner.config.authorization_poll,
            &format!("authorization {auth_url}"),
            &CancellationToken::new(),
            || async move {
                inner
                    .transport
                    .post_as_get(auth_url)
                    .await?
                    .json::<api::Authorization>()
            },
            |auth: &api::Authorization| auth.status.is_terminal(),
        )
        .await?;

        if auth.status != api::AuthorizationStatus::Valid {
            return Err(Error::AuthorizationInvalid {
                domain: auth.domain(),
                status: auth.status,
                problem: auth.problem().cloned(),
            });
        }

        Ok(())
    }

    /// Returns a reference to the challenge's API object.
    ///
    /// Useful for debugging.
    pub fn api_challenge(&self) -> &api::Challenge {
        &self.api_challenge
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        config::Config,
        poll::PollPolicy,
        test::{self, AuthzOutcome, Scenario},
        Directory, DirectoryUrl, Error,
    };

    async fn auths(server: &test::TestServer, domains: &[&str]) -> Vec<super::Auth> {
        let config = Config::default().with_poll_policy(PollPolicy::fixed(
            Duration::from_millis(5),
            Duration::from_secs(5),
        ));
        let dir = Directory::fetch_with_config(DirectoryUrl::Other(&server.dir_url), config)
            .await
            .unwrap();
        let acc = dir.register_account(None, true).await.unwrap();
        let ord = acc.new_order(domains).await.unwrap();
        ord.authorizations().await.unwrap()
    }

    #[tokio::test]
    async fn test_get_challenges() {
        let server = test::with_acme_server(Scenario::default());
        let authz = auths(&server, &["acme-test.example.com"]).await;
        assert_eq!(authz.len(), 1);
        let auth = &authz[0];

        let http = auth.http_challenge().unwrap();
        assert!(http.need_validate());
        assert_eq!(http.http_token(), "token-0-0");

        let proof = http.http_proof().unwrap();
        assert!(proof.starts_with("token-0-0."));

        let dns = auth.dns_challenge().unwrap();
        assert!(dns.need_validate());
        assert_ne!(dns.dns_proof().unwrap(), proof);

        let alpn = auth.tls_alpn_challenge().unwrap();
        assert_eq!(alpn.api_challenge().token, "token-0-2");
    }

    #[tokio::test]
    async fn test_manual_validate() {
        let server = test::with_acme_server(Scenario::default());
        let authz = auths(&server, &["a.example.com"]).await;

        authz[0].dns_challenge().unwrap().validate().await.unwrap();
        assert_eq!(server.state().challenge_posts.get(&(0, 1)), Some(&1));
    }

    #[tokio::test]
    async fn test_manual_validate_reports_invalid() {
        let server = test::with_acme_server(Scenario {
            outcomes: vec![("a.example.com", AuthzOutcome::Invalid)],
            ..Default::default()
        });
        let authz = auths(&server, &["a.example.com"]).await;

        let err = authz[0].http_challenge().unwrap().validate().await.unwrap_err();
        match err {
            Error::AuthorizationInvalid { domain, problem, .. } => {
                assert_eq!(domain, "a.example.com");
                assert!(problem.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
