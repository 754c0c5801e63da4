use std::sync::Arc;

use reqwest::StatusCode;

use crate::{
    acc::AccountInner,
    api,
    config::Config,
    error::Result,
    nonce::NoncePool,
    req::HttpClient,
    signer::Signer,
    trans::Transport,
    Account, AccountKey,
};

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory.
    ///
    /// Not appropriate for testing / development.
    LetsEncrypt,

    /// The staging Let's Encrypt directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates. The root signing
    /// certificate is not supposed to be in any trust chains.
    LetsEncryptStaging,

    /// Provide an arbitrary director URL to connect to.
    Other(&'a str),
}

impl<'a> DirectoryUrl<'a> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// Entry point for accessing an ACME API.
///
/// Holds the endpoint URLs, the HTTP client and the nonce pool shared by every account opened
/// through it. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct Directory {
    http: HttpClient,
    nonce_pool: Arc<NoncePool>,
    api_directory: api::Directory,
    config: Config,
}

impl Directory {
    /// Fetches the directory document with the default [`Config`].
    pub async fn fetch(url: DirectoryUrl<'_>) -> Result<Directory> {
        Self::fetch_with_config(url, Config::default()).await
    }

    pub async fn fetch_with_config(url: DirectoryUrl<'_>, config: Config) -> Result<Directory> {
        let http = HttpClient::new(&config)?;

        let res = http.get(url.to_url()).await?.into_result()?;
        let api_directory = res.json::<api::Directory>()?;

        let nonce_pool = Arc::new(NoncePool::new(&api_directory.new_nonce, http.clone()));
        nonce_pool.harvest(&res);

        Ok(Directory {
            http,
            nonce_pool,
            api_directory,
            config,
        })
    }

    /// Generates a fresh P-256 account key and registers it.
    ///
    /// Keep [`Account::acme_private_key_pem`] around and use [`load_account`] next time.
    ///
    /// [`load_account`]: Directory::load_account
    pub async fn register_account(
        &self,
        contact: Option<Vec<String>>,
        agree_to_terms: bool,
    ) -> Result<Account> {
        self.register_account_with_key(AccountKey::generate(), contact, agree_to_terms)
            .await
    }

    /// Registers an account for `key`.
    ///
    /// If the server already knows the key, the existing account is returned.
    pub async fn register_account_with_key(
        &self,
        key: AccountKey,
        contact: Option<Vec<String>>,
        agree_to_terms: bool,
    ) -> Result<Account> {
        let acc = api::Account {
            // TODO: ensure email contains no hfields or more than one addr-spec in the to component
            // see https://datatracker.ietf.org/doc/html/rfc8555#section-7.3
            contact,
            terms_of_service_agreed: agree_to_terms.then_some(true),
            ..Default::default()
        };

        self.open_account(key, &acc).await
    }

    /// Loads the account for a PEM encoded key, registering it if needed.
    pub async fn load_account(
        &self,
        private_key_pem: &str,
        contact: Option<Vec<String>>,
    ) -> Result<Account> {
        let key = AccountKey::from_pem(private_key_pem)?;
        self.register_account_with_key(key, contact, true).await
    }

    /// Loads the account for a PEM encoded key without ever creating one.
    pub async fn load_existing_account(&self, private_key_pem: &str) -> Result<Account> {
        let key = AccountKey::from_pem(private_key_pem)?;

        let acc = api::Account {
            only_return_existing: Some(true),
            ..Default::default()
        };

        self.open_account(key, &acc).await
    }

    async fn open_account(&self, key: AccountKey, acc: &api::Account) -> Result<Account> {
        let signer = Signer::new(Arc::clone(&self.nonce_pool), key);
        let mut transport = Transport::new(self.http.clone(), signer);

        let payload = serde_json::to_vec(acc)?;
        let res = transport
            .post_raw(&self.api_directory.new_account, &payload)
            .await?;

        // Some servers answer a repeated registration with 409 and the existing account's URL.
        let existing = res.status == StatusCode::CONFLICT && res.location.is_some();
        let res = if existing { res } else { res.into_result()? };

        let kid = res.expect_location()?;
        log::debug!("Key ID is: {kid}");

        // fill in the server returned key ID
        transport.set_key_id(kid.clone());

        let mut terms_link = res.link("terms-of-service").map(ToOwned::to_owned);

        let api_account = if existing {
            log::info!("Account already registered at {kid}");
            let res = transport.post_as_get(&kid).await?;
            terms_link = terms_link.or_else(|| res.link("terms-of-service").map(ToOwned::to_owned));
            res.json::<api::Account>()?
        } else {
            log::info!("Account ready at {kid}");
            res.json::<api::Account>()?
        };

        let terms_of_service =
            terms_link.or_else(|| self.api_directory.terms_of_service().map(ToOwned::to_owned));

        let inner = AccountInner {
            transport,
            api_directory: self.api_directory.clone(),
            config: self.config.clone(),
        };

        Ok(Account::new(inner, kid, api_account, terms_of_service))
    }

    /// Returns the session settings.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the directory's API object.
    ///
    /// Useful for debugging.
    pub fn api_directory(&self) -> &api::Directory {
        &self.api_directory
    }
}
