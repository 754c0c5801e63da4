use std::time::Duration;

use async_trait::async_trait;

use super::{Solver, SolverChallenge};

/// Record TTL used unless configured otherwise.
const DEFAULT_TTL: Duration = Duration::from_secs(120);

/// Access to a DNS zone, implemented once per DNS hosting provider.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Creates or replaces the `TXT` record `fqdn` with `value`.
    async fn create_txt_record(&self, fqdn: &str, value: &str, ttl: Duration) -> eyre::Result<()>;

    /// Removes the `TXT` record `fqdn` holding `value`.
    async fn remove_txt_record(&self, fqdn: &str, value: &str) -> eyre::Result<()>;
}

/// Solves `dns-01` challenges through a [`DnsProvider`].
///
/// The record is placed at:
///
/// ```text
/// _acme-challenge.<domain>.  TXT  <base64url(SHA-256(key authorization))>
/// ```
///
/// For wildcard domains the `*.` prefix is dropped. See [RFC 8555 §8.4].
///
/// [RFC 8555 §8.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.4
#[derive(Debug)]
pub struct Dns01Solver<P> {
    provider: P,
    ttl: Duration,
}

impl<P: DnsProvider> Dns01Solver<P> {
    pub fn new(provider: P) -> Self {
        Dns01Solver {
            provider,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Name of the `TXT` record for `domain`.
    pub fn record_name(domain: &str) -> String {
        let domain = domain.strip_prefix("*.").unwrap_or(domain);
        let domain = domain.trim_end_matches('.');
        format!("_acme-challenge.{domain}.")
    }
}

#[async_trait]
impl<P: DnsProvider> Solver for Dns01Solver<P> {
    fn can_solve(&self, challenge_type: &str) -> bool {
        challenge_type == "dns-01"
    }

    async fn present(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        let fqdn = Self::record_name(domain);
        let value = challenge.key_authorization.dns_value();

        log::debug!("Creating TXT record {fqdn}");
        self.provider
            .create_txt_record(&fqdn, &value, self.ttl)
            .await
    }

    async fn clean_up(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        let fqdn = Self::record_name(domain);
        let value = challenge.key_authorization.dns_value();

        log::debug!("Removing TXT record {fqdn}");
        self.provider.remove_txt_record(&fqdn, &value).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;
    use crate::solver::KeyAuthorization;

    /// In-memory zone.
    #[derive(Default)]
    struct Zone {
        records: Mutex<HashMap<String, (String, Duration)>>,
    }

    #[async_trait]
    impl DnsProvider for Zone {
        async fn create_txt_record(
            &self,
            fqdn: &str,
            value: &str,
            ttl: Duration,
        ) -> eyre::Result<()> {
            self.records
                .lock()
                .insert(fqdn.to_owned(), (value.to_owned(), ttl));
            Ok(())
        }

        async fn remove_txt_record(&self, fqdn: &str, value: &str) -> eyre::Result<()> {
            let mut records = self.records.lock();
            if records.get(fqdn).is_some_and(|(v, _)| v == value) {
                records.remove(fqdn);
            }
            Ok(())
        }
    }

    #[test]
    fn test_record_name() {
        assert_eq!(
            Dns01Solver::<Zone>::record_name("example.com"),
            "_acme-challenge.example.com."
        );
        assert_eq!(
            Dns01Solver::<Zone>::record_name("*.example.com"),
            "_acme-challenge.example.com."
        );
        assert_eq!(
            Dns01Solver::<Zone>::record_name("example.com."),
            "_acme-challenge.example.com."
        );
    }

    #[tokio::test]
    async fn test_present_twice_leaves_one_record() {
        let solver = Dns01Solver::new(Zone::default());
        let key_auth = KeyAuthorization::new("token", "thumb");
        let challenge = SolverChallenge {
            challenge_type: "dns-01".to_owned(),
            token: "token".to_owned(),
            url: "https://ca/chall/1".to_owned(),
            key_authorization: key_auth.clone(),
        };

        solver.present("*.example.com", &challenge).await.unwrap();
        solver.present("*.example.com", &challenge).await.unwrap();

        {
            let records = solver.provider().records.lock();
            assert_eq!(records.len(), 1);
            assert_eq!(
                records["_acme-challenge.example.com."],
                (key_auth.dns_value(), Duration::from_secs(120))
            );
        }

        solver.clean_up("*.example.com", &challenge).await.unwrap();
        assert!(solver.provider().records.lock().is_empty());
    }
}
