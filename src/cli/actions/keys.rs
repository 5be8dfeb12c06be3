use crate::tokens::{Ed25519Key, SigningKey};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use ulid::Ulid;

#[derive(Debug)]
pub struct Args {
    pub out: PathBuf,
}

/// Generate a key pair, write it to `out` and print the key id to pass in `--keys`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn execute(args: &Args) -> Result<()> {
    let kid = generate(args)?;
    println!("{kid}");
    Ok(())
}

fn generate(args: &Args) -> Result<Ulid> {
    if args.out.exists() {
        anyhow::bail!("refusing to overwrite {}", args.out.display());
    }
    let kid = Ulid::new();
    Ed25519Key::generate()
        .dump(&args.out)
        .with_context(|| format!("Failed to write key file: {}", args.out.display()))?;
    info!(%kid, path = %args.out.display(), "generated signing key");
    Ok(kid)
}
