use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const CMD_KEYS: &str = "keys";
pub const CMD_GENERATE: &str = "generate";
pub const ARG_OUT: &str = "out";

#[derive(Debug, PartialEq, Eq)]
pub struct Options {
    pub out: PathBuf,
}

impl Options {
    /// Parse the `keys generate` matches.
    ///
    /// # Errors
    /// Returns an error if `--out` is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let out = matches
            .get_one::<PathBuf>(ARG_OUT)
            .cloned()
            .with_context(|| format!("missing required argument: --{ARG_OUT}"))?;
        Ok(Self { out })
    }
}

#[must_use]
pub fn with_subcommand(command: Command) -> Command {
    command.subcommand(
        Command::new(CMD_KEYS)
            .about("Manage signing keys")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(
                Command::new(CMD_GENERATE)
                    .about("Generate an Ed25519 key pair and print its key id")
                    .arg(
                        Arg::new(ARG_OUT)
                            .short('o')
                            .long("out")
                            .help("Path of the PEM file to write")
                            .required(true)
                            .value_parser(clap::value_parser!(PathBuf)),
                    ),
            ),
    )
}
