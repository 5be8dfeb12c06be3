use crate::tokens::{config::parse_key_paths, TokenConfig};
use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_KEYS: &str = "keys";
pub const ARG_KEYS_DIR: &str = "keys-dir";
pub const ARG_AUDIENCE: &str = "audience";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_TOKEN_OVERLAP_SECONDS: &str = "token-overlap-seconds";

#[derive(Debug)]
pub struct Options {
    pub config: TokenConfig,
    pub keys_dir: PathBuf,
}

impl Options {
    /// Parse token arguments into a validated configuration.
    ///
    /// # Errors
    /// Returns an error if the issuer or audience is missing, the key map is
    /// malformed, or the lifetimes are inconsistent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let issuer = matches
            .get_one::<String>(ARG_ISSUER)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .with_context(|| format!("missing required argument: --{ARG_ISSUER}"))?;

        let audience: Vec<String> = matches
            .get_many::<String>(ARG_AUDIENCE)
            .into_iter()
            .flatten()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
        if audience.is_empty() {
            anyhow::bail!("missing required argument: --{ARG_AUDIENCE}");
        }

        let keys = match matches.get_one::<String>(ARG_KEYS) {
            Some(value) => parse_key_paths(value).context("invalid --keys")?,
            None => Default::default(),
        };

        let seconds = |id: &str| matches.get_one::<i64>(id).copied().unwrap_or_default();

        let config = TokenConfig {
            keys,
            audience,
            issuer,
            access_ttl: Duration::seconds(seconds(ARG_ACCESS_TTL_SECONDS)),
            refresh_ttl: Duration::seconds(seconds(ARG_REFRESH_TTL_SECONDS)),
            token_overlap: Duration::seconds(seconds(ARG_TOKEN_OVERLAP_SECONDS)),
        };
        config.validate().context("invalid token configuration")?;

        Ok(Self {
            config,
            keys_dir: matches
                .get_one::<PathBuf>(ARG_KEYS_DIR)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_KEYS)
                .long("keys")
                .help("Signing key files as kid=path pairs, comma separated")
                .long_help(
                    "Signing key files as kid=path pairs, comma separated. Key ids are ULIDs; the greatest id signs new tokens. When empty a key is generated and written to --keys-dir.",
                )
                .env("TESSERA_KEYS"),
        )
        .arg(
            Arg::new(ARG_KEYS_DIR)
                .long("keys-dir")
                .help("Directory for generated signing keys")
                .env("TESSERA_KEYS_DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_AUDIENCE)
                .long("audience")
                .help("Token audience URLs, comma separated; cookie domains derive from them")
                .env("TESSERA_AUDIENCE")
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long("issuer")
                .help("Issuer URL placed in the iss claim")
                .env("TESSERA_ISSUER"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long("access-ttl-seconds")
                .help("Access token lifetime in seconds")
                .env("TESSERA_ACCESS_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long("refresh-ttl-seconds")
                .help("Refresh token lifetime in seconds, counted from access issuance")
                .env("TESSERA_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_OVERLAP_SECONDS)
                .long("token-overlap-seconds")
                .help("Negative offset from access expiry at which the refresh token becomes valid")
                .env("TESSERA_TOKEN_OVERLAP_SECONDS")
                .default_value("-300")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
}
