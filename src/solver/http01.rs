use std::path::{Path, PathBuf};

use async_trait::async_trait;
use eyre::WrapErr as _;

use super::{Solver, SolverChallenge};

/// Serves `http-01` challenges from a web root.
///
/// The key authorization is written to:
///
/// ```text
/// <webroot>/.well-known/acme-challenge/<token>
/// ```
///
/// which the web server for the domain must serve over plain HTTP at:
///
/// ```text
/// http://<domain>/.well-known/acme-challenge/<token>
/// ```
///
/// See [RFC 8555 §8.3].
///
/// [RFC 8555 §8.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.3
#[derive(Debug, Clone)]
pub struct Http01Solver {
    webroot: PathBuf,
}

impl Http01Solver {
    pub fn new(webroot: impl Into<PathBuf>) -> Self {
        Http01Solver {
            webroot: webroot.into(),
        }
    }

    fn challenge_dir(&self) -> PathBuf {
        self.webroot.join(".well-known").join("acme-challenge")
    }

    /// Location of the token file for `token`.
    pub fn token_path(&self, token: &str) -> PathBuf {
        self.challenge_dir().join(token)
    }
}

#[async_trait]
impl Solver for Http01Solver {
    fn can_solve(&self, challenge_type: &str) -> bool {
        challenge_type == "http-01"
    }

    async fn present(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        check_token(&challenge.token)?;

        let dir = self.challenge_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .wrap_err_with(|| format!("creating {}", dir.display()))?;

        let path = self.token_path(&challenge.token);
        tokio::fs::write(&path, challenge.key_authorization.as_str())
            .await
            .wrap_err_with(|| format!("writing {}", path.display()))?;

        log::debug!("Serving http-01 token for {domain} from {}", path.display());
        Ok(())
    }

    async fn clean_up(&self, domain: &str, challenge: &SolverChallenge) -> eyre::Result<()> {
        check_token(&challenge.token)?;

        let path = self.token_path(&challenge.token);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("removing {}", path.display()));
            }
        }

        log::debug!("Removed http-01 token for {domain}");
        Ok(())
    }
}

/// Tokens are base64url; anything else could escape the challenge directory.
fn check_token(token: &str) -> eyre::Result<()> {
    let valid = !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if !valid || Path::new(token).components().count() != 1 {
        eyre::bail!("refusing suspicious challenge token {token:?}");
    }

    Ok(())
}
