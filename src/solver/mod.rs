//! Challenge solvers.
//!
//! A [`Solver`] provisions the artifact the ACME server checks to validate one challenge type, and
//! removes it again once the authorization is decided. Solvers are registered by challenge type in
//! a [`Solvers`] registry, which the order driver consults for every authorization.
//!
//! Reference solvers are provided for all three standard challenge types:
//!
//! - [`Http01Solver`] writes token files under a web root.
//! - [`Dns01Solver`] creates `TXT` records through a [`DnsProvider`].
//! - [`TlsAlpn01Solver`] publishes validation certificates into [`TlsAlpnCertificates`].

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use base64::prelude::*;
use sha2::{Digest as _, Sha256};

use crate::{
    api,
    error::{Error, Result},
    AccountKey,
};

mod dns01;
mod http01;
mod tls_alpn01;

pub use self::{
    dns01::{Dns01Solver, DnsProvider},
    http01::Http01Solver,
    tls_alpn01::{AlpnCertificate, TlsAlpn01Solver, TlsAlpnCertificates, ACME_TLS_ALPN_NAME},
};

/// Provisions and tears down the validation artifact of one challenge type.
///
/// `present` must be idempotent: presenting an artifact that is already in place is not an error.
/// `clean_up` is best effort; its errors are logged by the driver and never change the outcome of
/// an authorization.
///
/// The driver never calls `present` or `clean_up` concurrently for the same domain, but it does
/// for different domains. Implementations guard any shared state themselves.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Returns true if this solver handles `challenge_type` (e.g. `"http-01"`).
    fn can_solve(&self, challenge_type: &str) -> bool;

    async fn present(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()>;

    async fn clean_up(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()>;
}

/// Key authorization binding a challenge token to the account key.
///
/// See [RFC 8555 §8.1].
///
/// [RFC 8555 §8.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.1
#[derive(Clone, PartialEq, Eq)]
pub struct KeyAuthorization(String);

impl KeyAuthorization {
    /// Builds `token || '.' || thumbprint`.
    pub fn new(token: &str, thumbprint: &str) -> Self {
        KeyAuthorization(format!("{token}.{thumbprint}"))
    }

    pub(crate) fn for_key(token: &str, key: &AccountKey) -> Result<Self> {
        Ok(Self::new(token, &key.thumbprint()?))
    }

    /// The key authorization itself, served as the `http-01` token file body.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 of the key authorization, as embedded in `tls-alpn-01` certificates.
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.0.as_bytes()).into()
    }

    /// Base64url encoded [`digest`](Self::digest), the `dns-01` TXT record value.
    pub fn dns_value(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(self.digest())
    }
}

impl fmt::Debug for KeyAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyAuthorization").field(&self.0).finish()
    }
}

/// Everything a solver needs to know about one challenge.
#[derive(Debug, Clone)]
pub struct SolverChallenge {
    /// Challenge type, e.g. `"dns-01"`.
    pub challenge_type: String,

    pub token: String,

    /// Challenge URL; identifies the challenge uniquely.
    pub url: String,

    pub key_authorization: KeyAuthorization,
}

impl SolverChallenge {
    pub(crate) fn new(challenge: &api::Challenge, key: &AccountKey) -> Result<Self> {
        Ok(SolverChallenge {
            challenge_type: challenge._type.clone(),
            token: challenge.token.clone(),
            url: challenge.url.clone(),
            key_authorization: KeyAuthorization::for_key(&challenge.token, key)?,
        })
    }
}

/// Registry of solvers keyed by challenge type.
///
/// ```no_run
/// use acme::solver::{Http01Solver, Solvers};
///
/// let mut solvers = Solvers::new();
/// solvers.register("http-01", Http01Solver::new("/var/www"));
/// ```
#[derive(Clone, Default)]
pub struct Solvers {
    solvers: HashMap<String, Arc<dyn Solver>>,
}

impl Solvers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `solver` for `challenge_type`, replacing any previous registration.
    pub fn register(&mut self, challenge_type: &str, solver: impl Solver + 'static) -> &mut Self {
        self.register_shared(challenge_type, Arc::new(solver))
    }

    /// Like [`register`](Self::register) for a solver that is also used elsewhere.
    pub fn register_shared(&mut self, challenge_type: &str, solver: Arc<dyn Solver>) -> &mut Self {
        self.solvers.insert(challenge_type.to_owned(), solver);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Returns the solver registered for `challenge_type`, if it accepts that type.
    pub fn get(&self, challenge_type: &str) -> Option<&Arc<dyn Solver>> {
        self.solvers
            .get(challenge_type)
            .filter(|solver| solver.can_solve(challenge_type))
    }

    /// Picks the challenges to complete for `auth`.
    ///
    /// The first combination, in server order, for which every challenge has a solver wins. A
    /// combination naming a challenge index the server did not send can never be satisfied.
    /// Repeated indices within a combination are picked once.
    pub(crate) fn select(
        &self,
        auth: &api::Authorization,
    ) -> Result<Vec<(api::Challenge, Arc<dyn Solver>)>> {
        for combination in auth.combinations() {
            let mut seen = HashSet::new();

            let picked = combination
                .into_iter()
                .filter(|idx| seen.insert(*idx))
                .map(|idx| {
                    let challenge = auth.challenges.get(idx)?;
                    let solver = self.get(&challenge._type)?;
                    Some((challenge.clone(), Arc::clone(solver)))
                })
                .collect::<Option<Vec<_>>>();

            match picked {
                Some(picked) if !picked.is_empty() => return Ok(picked),
                _ => continue,
            }
        }

        Err(Error::NoSolver {
            domain: auth.domain(),
        })
    }
}

impl fmt::Debug for Solvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types = self.solvers.keys().collect::<Vec<_>>();
        types.sort();

        f.debug_struct("Solvers").field("types", &types).finish()
    }
}
