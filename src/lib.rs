//! Provisioning certificates from ACME (Automatic Certificate Management Environment) providers
//! such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! It follows [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555), using ACME v2 to
//! issue/renew certificates. Domain ownership is proven through pluggable [solvers](solver), and
//! every domain of an order is authorized concurrently.
//!
//! # Usage
//!
//! ```no_run
//! use acme::{
//!     create_p256_key,
//!     solver::{Http01Solver, Solvers},
//!     Directory, DirectoryUrl,
//! };
//!
//! async fn issue() -> acme::Result<()> {
//!     let dir = Directory::fetch(DirectoryUrl::LetsEncryptStaging).await?;
//!
//!     let contact = vec!["mailto:foo@bar.com".to_owned()];
//!     let acc = dir.register_account(Some(contact), true).await?;
//!
//!     let mut solvers = Solvers::new();
//!     solvers.register("http-01", Http01Solver::new("/var/www"));
//!
//!     let cert = acc
//!         .new_order(&["example.org", "www.example.org"])
//!         .await?
//!         .wait_ready(&solvers)
//!         .await?
//!         .finalize_with_key(create_p256_key())
//!         .await?
//!         .download()
//!         .await?;
//!
//!     println!("{} days left", cert.valid_days_left()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Examples
//!
//! A complete `http-01` example serving tokens with Actix Web is in `demos/http-01.rs`.
//!
//! # Domain Ownership
//!
//! Most website TLS certificates tries to prove ownership/control over the domain they are issued
//! for. For ACME, this means proving you control either:
//!
//! - a server answering TLS or HTTP requests for that domain;
//! - the DNS server answering name lookups against the domain.
//!
//! A [`Solver`](solver::Solver) is registered per challenge type and provisions (then removes) the
//! artifact for each domain. To drive the challenges by hand instead, see [`tls_alpn_challenge`],
//! [`http_challenge`], and [`dns_challenge`].
//!
//! ## Multiple Domains
//!
//! When creating a new order, it's possible to provide multiple alt-names that will also be part of
//! the certificate. The ACME API requires you to prove ownership of each such domain. Failures are
//! collected per domain, see [`AuthorizationError`].
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API is not being abused. It
//! might be tempting to poll really often through [`Config`], but balance this against the real
//! risk of having access cut off.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for development where the rate
//! limits are more relaxed. See [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [`http_challenge`]: crate::order::Auth::http_challenge()
//! [`tls_alpn_challenge`]: crate::order::Auth::tls_alpn_challenge()
//! [`dns_challenge`]: crate::order::Auth::dns_challenge()
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod cert;
mod config;
mod dir;
mod error;
mod jws;
mod nonce;
mod poll;
mod req;
mod signer;
mod trans;

pub mod api;
pub mod order;
pub mod solver;


pub use tokio_util::sync::CancellationToken;

pub use crate::{
    acc::{Account, AccountKey, MIN_RSA_BITS},
    cert::{create_csr_der, create_p256_key, Certificate},
    config::Config,
    dir::{Directory, DirectoryUrl},
    error::{AuthorizationError, DomainFailure, Error, Result},
    poll::PollPolicy,
};
