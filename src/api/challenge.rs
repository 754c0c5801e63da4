use serde::{Deserialize, Serialize};

use crate::api;

/// Where the server is in validating an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// One way offered by the server to prove control of an identifier.
///
/// See [RFC 8555 §7.1.5].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "http-01",
///   "status": "pending",
///   "url": "https://acme-staging-v02.api.letsencrypt.org/acme/challenge/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs/216789597",
///   "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
/// }
/// ```
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// `http-01`, `dns-01`, `tls-alpn-01` or a type this crate has no solver for.
    #[serde(rename = "type")]
    pub _type: String,

    /// Posting an empty object here asks the server to validate.
    pub url: String,

    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge.
    ///
    /// Uses RFC 3339 format.
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if any.
    pub error: Option<api::Problem>,

    /// Empty for challenge types that carry no token.
    #[serde(default)]
    pub token: String,
}

impl Challenge {
    /// True until the client has asked the server to validate this challenge.
    pub fn is_pending(&self) -> bool {
        self.status == ChallengeStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_challenge_keeps_problem() {
        let challenge = serde_json::from_str::<Challenge>(
            r#"{
                "type": "dns-01",
                "status": "invalid",
                "error": {
                    "type": "urn:ietf:params:acme:error:dns",
                    "detail": "DNS problem: NXDOMAIN looking up TXT for _acme-challenge.example.com",
                    "status": 400
                },
                "url": "https://ca/chall/1",
                "token": "YsNqBWZnyYjDun3aUC2CkCopOaqZRrI5hp3tUjxPLQU"
            }"#,
        )
        .unwrap();

        assert!(!challenge.is_pending());
        let problem = challenge.error.unwrap();
        assert_eq!(problem._type, "urn:ietf:params:acme:error:dns");
        assert_eq!(problem.status, Some(400));
    }
}
