// certmailer - bulk certificate generation and delivery.
//
// **Architecture Overview:**
// - `core/` = Business logic (participant parsing, pipeline, run report)
// - `infra/` = Implementations of core traits (Google APIs, SMTP)
//
// This file's job is to:
// 1. Load configuration
// 2. Resolve Google credentials
// 3. Run the batch, one participant at a time
// 4. Render the run report

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::sync::Arc;

use anyhow::{bail, Context};

use crate::config::AppConfig;
use crate::core::certificates::{CertificateService, PipelineOptions};
use crate::core::participants::parse_participants;
use crate::infra::google::auth::{
    AccessTokenProvider, AuthorizedUserAuth, FileTokenCache, ServiceAccountAuth,
};
use crate::infra::google::drive_client::DriveClient;
use crate::infra::google::slides_client::SlidesClient;
use crate::infra::mail::smtp_mailer::SmtpMailer;

/// Token the certificate template and body file use for the participant name.
const PLACEHOLDER: &str = "{{nama}}";

struct CliArgs {
    template_id: String,
    participants_file: String,
    /// Use the interactive delegated-user flow instead of a service account.
    use_oauth: bool,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut use_oauth = false;
    let mut positional = Vec::new();

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--oauth" => use_oauth = true,
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        bail!("usage: certmailer [--oauth] <template-id> <participants-file>");
    }

    let mut positional = positional.into_iter();
    Ok(CliArgs {
        template_id: positional.next().unwrap_or_default(),
        participants_file: positional.next().unwrap_or_default(),
        use_oauth,
    })
}

/// Picks the credential variant. The service account path reads
/// `GOOGLE_SERVICE_ACCOUNT_KEY`/`GOOGLE_SERVICE_ACCOUNT_JSON`; the delegated
/// path reads `GOOGLE_OAUTH_CLIENT` and caches its token at
/// `GOOGLE_TOKEN_CACHE` (default `token_cache.json`).
async fn resolve_credentials(use_oauth: bool) -> anyhow::Result<Arc<dyn AccessTokenProvider>> {
    if use_oauth {
        let cache_path = std::env::var("GOOGLE_TOKEN_CACHE")
            .unwrap_or_else(|_| "token_cache.json".to_string());
        let cache = Box::new(FileTokenCache::new(cache_path));

        let auth = match std::env::var("GOOGLE_OAUTH_CLIENT") {
            Ok(path) => AuthorizedUserAuth::from_client_file(&path, cache)
                .await
                .context("loading OAuth client descriptor")?,
            // A previously cached token can still carry the run.
            Err(_) => AuthorizedUserAuth::new(None, cache),
        };
        Ok(Arc::new(auth))
    } else {
        let auth = ServiceAccountAuth::from_env()
            .await
            .context("loading service account credentials")?;
        Ok(Arc::new(auth))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load .env before anything reads the environment.
    dotenv::dotenv().ok();

    let args = parse_args()?;
    let config = AppConfig::from_env()?;

    let raw = std::fs::read_to_string(&args.participants_file)
        .with_context(|| format!("reading participants file {}", args.participants_file))?;
    let participants = parse_participants(&raw);
    if participants.is_empty() {
        bail!(
            "no valid participants in {} (expected one `Name, email` per line)",
            args.participants_file
        );
    }
    tracing::info!("Detected {} participant(s)", participants.len());

    let auth = resolve_credentials(args.use_oauth).await?;
    let drive = DriveClient::new(Arc::clone(&auth));
    let slides = SlidesClient::new(auth);
    let mailer = SmtpMailer::new(
        config.sender.clone(),
        config.password.clone(),
        config.smtp_relay.clone(),
        config.smtp_port,
    );

    let options = PipelineOptions {
        template_id: args.template_id,
        folder_id: config.folder_id.clone(),
        placeholder: PLACEHOLDER.to_string(),
        subject: config.subject.clone(),
        body_template: config.body_template.clone(),
    };

    let service = CertificateService::new(drive, slides, mailer, options);
    let report = service.run_batch(&participants).await;

    println!("\n{}\n", report.render_table());
    println!(
        "Sent {} of {} certificate(s), {} failed.",
        report.sent_count(),
        report.len(),
        report.failed_count()
    );

    if report.sent_count() == 0 {
        bail!("no certificates were delivered");
    }
    Ok(())
}
