use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Authorization`].
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

impl AuthorizationStatus {
    /// Returns true once the server will no longer change this status on its own.
    pub fn is_terminal(self) -> bool {
        !matches!(self, AuthorizationStatus::Pending)
    }
}

/// The server's record of whether the account controls one identifier.
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Identifier being proven. For wildcard orders the `*.` prefix is not part of the value.
    pub identifier: api::Identifier,

    pub status: AuthorizationStatus,

    /// RFC 3339 timestamp after which the authorization can no longer be used.
    pub expires: Option<String>,

    /// While pending, the offered challenges. Once decided, the challenge that was validated or
    /// that failed, carrying the server's problem in `error`.
    pub challenges: Vec<api::Challenge>,

    /// Set for authorizations of a wildcard identifier.
    pub wildcard: Option<bool>,

    /// Sets of challenge indices that together satisfy this authorization.
    ///
    /// Only sent by servers predating RFC 8555. When absent, any single challenge suffices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinations: Option<Vec<Vec<usize>>>,
}

impl Authorization {
    /// Returns true if authorization was created for a wildcard domain.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }

    /// Domain name this authorization proves, with `*.` restored for wildcard authorizations.
    pub fn domain(&self) -> String {
        if self.is_wildcard() && !self.identifier.value.starts_with("*.") {
            format!("*.{}", self.identifier.value)
        } else {
            self.identifier.value.clone()
        }
    }

    /// Returns the challenge combinations in server order.
    ///
    /// Falls back to one combination per challenge when the server did not send any.
    pub fn combinations(&self) -> Vec<Vec<usize>> {
        match &self.combinations {
            Some(combinations) => combinations.clone(),
            None => (0..self.challenges.len()).map(|idx| vec![idx]).collect(),
        }
    }

    /// Returns the first problem reported on any of the challenges.
    pub fn problem(&self) -> Option<&api::Problem> {
        self.challenges.iter().find_map(|c| c.error.as_ref())
    }

    /// Returns an `http-01` challenge, if one is present.
    pub fn http_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "http-01")
    }

    /// Returns a `dns-01` challenge, if one is present.
    pub fn dns_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "dns-01")
    }

    /// Returns a `tls-alpn-01` challenge, if one is present.
    pub fn tls_alpn_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "tls-alpn-01")
    }
}
