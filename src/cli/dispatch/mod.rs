//! Map validated CLI matches to an action.

use crate::cli::actions::{keys, server, Action};
use crate::cli::commands::{self, tokens, workflow};
use anyhow::{bail, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(keys_matches) = matches.subcommand_matches(commands::keys::CMD_KEYS) {
        return match keys_matches.subcommand() {
            Some((commands::keys::CMD_GENERATE, generate)) => {
                let options = commands::keys::Options::parse(generate)?;
                Ok(Action::GenerateKey(keys::Args { out: options.out }))
            }
            _ => bail!("missing keys subcommand"),
        };
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let token_opts = tokens::Options::parse(matches)?;
    let workflow_opts = workflow::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        tokens: token_opts.config,
        keys_dir: token_opts.keys_dir,
        verification_secret: workflow_opts.verification_secret,
        verification_ttl_seconds: workflow_opts.verification_ttl_seconds,
        resend_cooldown_seconds: workflow_opts.resend_cooldown_seconds,
        seed: workflow_opts.seed,
    }))
}
