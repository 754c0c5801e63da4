//! Concurrent authorization of every identifier in an order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    acc::AccountInner,
    api,
    error::{AuthorizationError, DomainFailure, Error, Result},
    poll::poll_until,
    solver::{Solver, SolverChallenge, Solvers},
};

/// Authorizes every URL in `authorizations`, one task each.
///
/// `labels` name each authorization in failures raised before its identifier is known. Returns
/// once every task has finished, clean-up included.
pub(crate) async fn authorize_all(
    inner: &Arc<AccountInner>,
    solvers: &Solvers,
    authorizations: &[String],
    labels: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    // zero permits would park every task forever
    let limit = inner
        .config
        .max_concurrency
        .map(|permits| Arc::new(Semaphore::new(permits.max(1))));
    let solvers = Arc::new(solvers.clone());

    let mut tasks = Vec::with_capacity(authorizations.len());

    for (url, label) in authorizations.iter().zip(labels) {
        let inner = Arc::clone(inner);
        let solvers = Arc::clone(&solvers);
        let limit = limit.clone();
        let cancel = cancel.clone();
        let url = url.clone();
        let fallback = label.clone();

        let task = tokio::spawn(async move {
            let _permit = match limit {
                Some(limit) => tokio::select! {
                    _ = cancel.cancelled() => return (fallback, Err(Error::Cancelled)),
                    permit = limit.acquire_owned() => permit.ok(),
                },
                None => None,
            };

            let auth = match fetch_authorization(&inner, &url, &cancel).await {
                Ok(auth) => auth,
                Err(err) => return (fallback, Err(err)),
            };

            let domain = auth.domain();
            let res = authorize(&inner, &solvers, &url, auth, &cancel).await;
            (domain, res)
        });

        tasks.push((label.clone(), task));
    }

    let mut failures = Vec::new();
    let mut cancelled = false;

    for (label, task) in tasks {
        let (domain, res) = match task.await {
            Ok(outcome) => outcome,
            Err(err) => (
                label.clone(),
                Err(Error::Order(format!("authorization task for {label} failed: {err}"))),
            ),
        };

        match res {
            Ok(()) => log::info!("Authorized {domain}"),
            Err(Error::Cancelled) => cancelled = true,
            Err(error) => {
                log::warn!("Authorization for {domain} failed: {error}");
                failures.push(DomainFailure { domain, error });
            }
        }
    }

    if cancelled || cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if !failures.is_empty() {
        return Err(Error::Authorization(AuthorizationError::new(failures)));
    }

    Ok(())
}

async fn fetch_authorization(
    inner: &AccountInner,
    url: &str,
    cancel: &CancellationToken,
) -> Result<api::Authorization> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = inner.transport.post_as_get(url) => res?.json(),
    }
}

/// Drives one authorization to a decision.
///
/// Whatever happens after the first `present`, every presented challenge is cleaned up before
/// this returns.
async fn authorize(
    inner: &AccountInner,
    solvers: &Solvers,
    url: &str,
    auth: api::Authorization,
    cancel: &CancellationToken,
) -> Result<()> {
    let domain = auth.domain();

    match auth.status {
        api::AuthorizationStatus::Valid => {
            log::debug!("Authorization for {domain} is already valid");
            return Ok(());
        }
        api::AuthorizationStatus::Pending => {}
        status => {
            return Err(Error::AuthorizationInvalid {
                domain,
                status,
                problem: auth.problem().cloned(),
            });
        }
    }

    let picked = solvers.select(&auth)?;

    let mut presented = Vec::with_capacity(picked.len());
    let res = present_and_validate(inner, &domain, url, &picked, &mut presented, cancel).await;

    for (solver, challenge) in presented {
        if let Err(err) = solver.clean_up(&domain, &challenge).await {
            log::warn!(
                "Cleaning up {} challenge for {domain} failed: {err:#}",
                challenge.challenge_type
            );
        }
    }

    res
}

async fn present_and_validate(
    inner: &AccountInner,
    domain: &str,
    url: &str,
    picked: &[(api::Challenge, Arc<dyn Solver>)],
    presented: &mut Vec<(Arc<dyn Solver>, SolverChallenge)>,
    cancel: &CancellationToken,
) -> Result<()> {
    for (challenge, solver) in picked {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let solver_challenge = SolverChallenge::new(challenge, inner.transport.acme_key())?;

        // recorded first, a failed present may have left something behind
        presented.push((Arc::clone(solver), solver_challenge.clone()));

        solver
            .present(domain, &solver_challenge)
            .await
            .map_err(|report| Error::Solver {
                domain: domain.to_owned(),
                report,
            })?;

        log::debug!("Presented {} challenge for {domain}", challenge._type);
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    for (challenge, _) in picked {
        if !challenge.is_pending() {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = inner.transport.post(&challenge.url, &api::EmptyObject) => {
                res?;
            }
        }
    }

    let auth = poll_until(
        &inner.config.authorization_poll,
        &format!("authorization for {domain}"),
        cancel,
        || fetch_authorization(inner, url, cancel),
        |auth: &api::Authorization| auth.status.is_terminal(),
    )
    .await?;

    if auth.status != api::AuthorizationStatus::Valid {
        return Err(Error::AuthorizationInvalid {
            domain: domain.to_owned(),
            status: auth.status,
            problem: auth.problem().cloned(),
        });
    }

    Ok(())
}
