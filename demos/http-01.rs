use std::fs;

use acme::{
    create_p256_key,
    solver::{Http01Solver, Solvers},
    Directory, DirectoryUrl,
};
use actix_files::Files;
use actix_web::{App, HttpServer};

const DOMAINS: &[&str] = &["example.org", "www.example.org"];

const WEBROOT: &str = "acme-webroot";

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Use `DirectoryUrl::LetsEncrypt` for production uses.
    let url = DirectoryUrl::LetsEncryptStaging;

    // Temporary Actix Web server answering the ACME challenges from the web root.
    let srv = HttpServer::new(|| {
        App::new().service(Files::new(
            "/.well-known/acme-challenge",
            format!("{WEBROOT}/.well-known/acme-challenge"),
        ))
    })
    .bind(("0.0.0.0", 80))?
    .shutdown_timeout(0)
    .run();

    let srv_handle = srv.handle();
    let srv_task = actix_web::rt::spawn(srv);

    let dir = Directory::fetch(url).await?;

    // Your contact addresses, note the `mailto:`
    let contact = vec!["mailto:foo@bar.com".to_owned()];

    // Generates an account key. Store the PEM and use `load_account` afterwards.
    let acc = dir.register_account(Some(contact.clone()), true).await?;

    let key_pem = acc.acme_private_key_pem()?;
    let acc = dir.load_account(&key_pem, Some(contact)).await?;

    // Token files land under the web root served above.
    let mut solvers = Solvers::new();
    solvers.register("http-01", Http01Solver::new(WEBROOT));

    // Authorizes every domain, cleaning up the token files as each one is decided.
    let ord_csr = acc.new_order(DOMAINS).await?.wait_ready(&solvers).await?;

    // A fresh key for the certificate. Use `finalize` to submit a CSR of your own instead.
    let ord_cert = ord_csr.finalize_with_key(create_p256_key()).await?;

    let cert = ord_cert.download().await?;
    println!("{}", cert.certificate_pem()?);
    println!("valid for {} more days", cert.valid_days_left()?);

    srv_handle.stop(true).await;
    srv_task.await??;

    fs::remove_dir_all(WEBROOT)?;

    Ok(())
}
