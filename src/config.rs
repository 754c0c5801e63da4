use std::time::Duration;

use crate::poll::PollPolicy;

/// Session wide settings, fixed when the [`Directory`](crate::Directory) is fetched.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time allowed to establish a connection to the ACME server.
    pub connect_timeout: Duration,

    /// Time allowed for a whole request, including reading the response.
    pub request_timeout: Duration,

    /// Value of the `User-Agent` header.
    pub user_agent: String,

    /// How authorizations are polled after their challenges were submitted.
    pub authorization_poll: PollPolicy,

    /// How orders are polled while waiting for `ready` and for issuance.
    pub order_poll: PollPolicy,

    /// Upper bound on identifiers authorized at the same time.
    ///
    /// `None` runs one task per identifier.
    pub max_concurrency: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            authorization_poll: PollPolicy::default(),
            order_poll: PollPolicy::default(),
            max_concurrency: None,
        }
    }
}

impl Config {
    /// Uses `policy` for both authorization and order polling.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.authorization_poll = policy.clone();
        self.order_poll = policy;
        self
    }

    /// Limits how many identifiers are authorized concurrently.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
