use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;

pub const ARG_VERIFICATION_SECRET: &str = "verification-secret";
pub const ARG_VERIFICATION_TTL_SECONDS: &str = "verification-ttl-seconds";
pub const ARG_RESEND_COOLDOWN_SECONDS: &str = "resend-cooldown-seconds";
pub const ARG_SEED: &str = "seed";

#[derive(Debug)]
pub struct Options {
    pub verification_secret: SecretString,
    pub verification_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub seed: Option<PathBuf>,
}

impl Options {
    /// # Errors
    /// Returns an error if the verification secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let verification_secret = matches
            .get_one::<String>(ARG_VERIFICATION_SECRET)
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::from(value.clone()))
            .with_context(|| format!("missing required argument: --{ARG_VERIFICATION_SECRET}"))?;

        Ok(Self {
            verification_secret,
            verification_ttl_seconds: matches
                .get_one::<i64>(ARG_VERIFICATION_TTL_SECONDS)
                .copied()
                .unwrap_or(1800),
            resend_cooldown_seconds: matches
                .get_one::<i64>(ARG_RESEND_COOLDOWN_SECONDS)
                .copied()
                .unwrap_or(60),
            seed: matches.get_one::<PathBuf>(ARG_SEED).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERIFICATION_SECRET)
                .long("verification-secret")
                .help("HMAC secret for email verification and password reset tokens")
                .env("TESSERA_VERIFICATION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_TTL_SECONDS)
                .long("verification-ttl-seconds")
                .help("Verification token TTL in seconds")
                .env("TESSERA_VERIFICATION_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESEND_COOLDOWN_SECONDS)
                .long("resend-cooldown-seconds")
                .help("Cooldown before another verification token is sent")
                .env("TESSERA_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_SEED)
                .long("seed")
                .help("JSON file of users and API keys loaded into the in-memory store")
                .env("TESSERA_SEED")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn secret_is_required() {
        temp_env::with_vars([("TESSERA_VERIFICATION_SECRET", None::<&str>)], || {
            let matches = with_args(Command::new("tessera")).get_matches_from(vec!["tessera"]);
            assert!(Options::parse(&matches).is_err());

            let matches = with_args(Command::new("tessera"))
                .get_matches_from(vec!["tessera", "--verification-secret", "   "]);
            assert!(Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn values_from_env() {
        temp_env::with_vars(
            [
                ("TESSERA_VERIFICATION_SECRET", Some("s3cr3t")),
                ("TESSERA_VERIFICATION_TTL_SECONDS", Some("900")),
                ("TESSERA_RESEND_COOLDOWN_SECONDS", None),
                ("TESSERA_SEED", Some("/etc/tessera/seed.json")),
            ],
            || {
                let matches = with_args(Command::new("tessera")).get_matches_from(vec!["tessera"]);
                let options = Options::parse(&matches);
                assert!(options.is_ok());
                if let Ok(options) = options {
                    assert_eq!(options.verification_secret.expose_secret(), "s3cr3t");
                    assert_eq!(options.verification_ttl_seconds, 900);
                    assert_eq!(options.resend_cooldown_seconds, 60);
                    assert_eq!(options.seed, Some(PathBuf::from("/etc/tessera/seed.json")));
                }
            },
        );
    }

    #[test]
    fn ttl_must_be_positive() {
        temp_env::with_vars([("TESSERA_VERIFICATION_TTL_SECONDS", None::<&str>)], || {
            let result = with_args(Command::new("tessera")).try_get_matches_from(vec![
                "tessera",
                "--verification-ttl-seconds",
                "0",
            ]);
            assert!(result.is_err());
        });
    }
}
