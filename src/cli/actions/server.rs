use crate::{
    api,
    auth::{AuthWorkflow, FailureDelay, LogTokenSender, MemoryStore, Seed, WorkflowConfig},
    cookies::CookieManager,
    tokens::{Issuer, SigningKey, TokenConfig},
    verification::TokenSigner,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub tokens: TokenConfig,
    pub keys_dir: PathBuf,
    pub verification_secret: SecretString,
    pub verification_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    /// Records loaded into the in-memory store at startup.
    pub seed: Option<PathBuf>,
}

/// Build the issuer and workflow, then serve until shutdown.
///
/// # Errors
/// Returns an error if the configuration is invalid, keys cannot be loaded or
/// generated, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let workflow = Arc::new(workflow(&args).await?);

    api::new(args.port, workflow).await
}

pub(crate) async fn workflow(args: &Args) -> Result<AuthWorkflow> {
    let issuer = load_issuer(&args.tokens, &args.keys_dir)?;

    let signer = TokenSigner::new(args.verification_secret.clone())
        .context("Invalid verification secret")?;

    let config = WorkflowConfig::new()
        .with_verification_ttl_seconds(args.verification_ttl_seconds)
        .with_resend_cooldown_seconds(args.resend_cooldown_seconds)
        .with_failure_delay(FailureDelay::default());

    let store = Arc::new(MemoryStore::new());
    warn!("Using the in-memory credential store; records are lost on restart");
    match &args.seed {
        Some(path) => {
            let (users, api_keys) = Seed::load(path)?.apply(&store).await?;
            info!(users, api_keys, path = %path.display(), "seeded credential store");
        }
        None => warn!("No seed file; login and API key authentication fail until records exist"),
    }

    Ok(AuthWorkflow::new(
        Arc::new(issuer),
        CookieManager::default(),
        store,
        signer,
        Arc::new(LogTokenSender),
        config,
    ))
}

/// Load the configured keys, or generate one into `keys_dir` when none are configured.
fn load_issuer(config: &TokenConfig, keys_dir: &Path) -> Result<Issuer> {
    let issuer = Issuer::new(config).context("Invalid token configuration")?;

    if config.keys.is_empty() {
        let (kid, key) = issuer.generate_key().context("Failed to generate signing key")?;
        let path = keys_dir.join(format!("{kid}.pem"));
        key.dump(&path)
            .with_context(|| format!("Failed to write key file: {}", path.display()))?;
        info!(%kid, path = %path.display(), "generated signing key");
    } else {
        issuer
            .load_keys(&config.keys)
            .context("Failed to load signing keys")?;
    }

    if let Some(kid) = issuer.current_key_id() {
        info!(%kid, keys = issuer.key_set().len(), "signing with key");
    }
    Ok(issuer)
}
