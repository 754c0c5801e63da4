use std::sync::Arc;

use zeroize::Zeroizing;

use crate::{
    api,
    config::Config,
    error::{Error, Result},
    order::{NewOrder, Order},
    trans::Transport,
};

mod acme_key;

pub use self::acme_key::{AccountKey, MIN_RSA_BITS};
pub(crate) use self::acme_key::thumbprint_digest;

/// State shared by an account and every order created from it.
#[derive(Debug)]
pub(crate) struct AccountInner {
    pub(crate) transport: Transport,
    pub(crate) api_directory: api::Directory,
    pub(crate) config: Config,
}

/// Account with an ACME provider.
///
/// Accounts are created using [`Directory::register_account()`] and consists of a contact email
/// address and a private key for signing requests to the ACME API.
///
/// By default this library uses elliptic curve P-256 for accessing the account. The advantages of
/// using elliptic curve cryptography are that the signed requests against the ACME lib are small
/// and that the public key can be derived from the private key. RSA keys are accepted through
/// [`Directory::register_account_with_key()`].
///
/// [`Directory::register_account()`]: crate::Directory::register_account()
/// [`Directory::register_account_with_key()`]: crate::Directory::register_account_with_key()
#[derive(Debug, Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
    url: String,
    api_account: api::Account,
    terms_of_service: Option<String>,
}

impl Account {
    pub(crate) fn new(
        inner: AccountInner,
        url: String,
        api_account: api::Account,
        terms_of_service: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            url,
            api_account,
            terms_of_service,
        }
    }

    /// The account URL, also used as key ID in signed requests.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Terms of service the provider wants agreed to, if it published any.
    pub fn terms_of_service(&self) -> Option<&str> {
        self.terms_of_service.as_deref()
    }

    /// Private key for this account.
    pub fn acme_private_key_pem(&self) -> Result<Zeroizing<String>> {
        self.inner.transport.acme_key().to_pem()
    }

    /// Records agreement to the provider's terms of service.
    pub async fn agree_to_terms(&mut self) -> Result<()> {
        let update = api::Account {
            terms_of_service_agreed: Some(true),
            ..Default::default()
        };

        let res = self.inner.transport.post(&self.url, &update).await?;
        self.api_account = res.json()?;

        log::info!("Agreed to terms of service for {}", self.url);
        Ok(())
    }

    /// Re-fetches the account resource (POST-as-GET).
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.inner.transport.post_as_get(&self.url).await?;
        self.api_account = res.json()?;
        Ok(())
    }

    /// Create a new order to issue a certificate for this account.
    ///
    /// Domain names are lower-cased and stripped of a trailing dot. Duplicates are dropped,
    /// keeping the first occurrence, which also becomes the certificate's `CN`.
    ///
    /// This library doesn't constrain the number of domains, but it is limited by the ACME API
    /// provider. Let's Encrypt [sets a max of 100 names] per certificate.
    ///
    /// Every call creates a new order with the ACME API provider, even when the domain names
    /// supplied are exactly the same.
    ///
    /// [sets a max of 100 names]: https://letsencrypt.org/docs/rate-limits/
    pub async fn new_order(&self, domains: &[&str]) -> Result<NewOrder> {
        let identifiers = normalize_domains(domains)
            .into_iter()
            .map(|domain| api::Identifier::dns(&domain))
            .collect::<Vec<_>>();

        if identifiers.is_empty() {
            return Err(Error::Order("an order needs at least one domain".to_owned()));
        }

        let order = api::Order::from_identifiers(identifiers);

        let new_order_url = self.inner.api_directory.new_order.as_str();
        let res = self.inner.transport.post(new_order_url, &order).await?;

        if res.status != reqwest::StatusCode::CREATED {
            return Err(Error::Order(format!(
                "newOrder answered {} instead of 201 Created",
                res.status
            )));
        }

        let order_url = res.expect_location()?;
        let api_order = res.json::<api::Order>()?;

        let mut order = Order::new(&self.inner, order, order_url);
        order.api_order.overwrite(api_order)?;

        log::info!("Created order {} for {:?}", order.url, order.api_order.domains());
        Ok(NewOrder { order })
    }

    /// Returns a reference to the account's API object.
    ///
    /// Useful for debugging.
    pub fn api_account(&self) -> &api::Account {
        &self.api_account
    }
}

fn normalize_domains(domains: &[&str]) -> Vec<String> {
    let mut normalized = Vec::<String>::with_capacity(domains.len());

    for domain in domains {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();

        if !domain.is_empty() && !normalized.contains(&domain) {
            normalized.push(domain);
        }
    }

    normalized
}
