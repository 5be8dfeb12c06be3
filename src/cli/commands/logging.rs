use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_JSON: &str = "log-json";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub verbosity: u8,
    pub json: bool,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            verbosity: matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0),
            json: matches.get_flag(ARG_LOG_JSON),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TESSERA_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_JSON)
                .long("log-json")
                .help("Emit logs as JSON lines")
                .env("TESSERA_LOG_JSON")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_by_name_and_number() {
        let parser = validator_log_level();
        let command = Command::new("test").arg(Arg::new("level").value_parser(parser));
        for (input, expected) in [("error", 0_u8), ("WARN", 1), ("debug", 3), ("4", 4)] {
            let matches = command.clone().get_matches_from(vec!["test", input]);
            assert_eq!(matches.get_one::<u8>("level").copied(), Some(expected));
        }
        assert!(command
            .clone()
            .try_get_matches_from(vec!["test", "loud"])
            .is_err());
        assert!(command.try_get_matches_from(vec!["test", "9"]).is_err());
    }

    #[test]
    fn json_flag() {
        temp_env::with_vars(
            [("TESSERA_LOG_JSON", None::<&str>), ("TESSERA_LOG_LEVEL", None)],
            || {
            let command = with_args(Command::new("test"));
            let options = Options::parse(&command.clone().get_matches_from(vec!["test"]));
            assert!(!options.json);
            let options = Options::parse(&command.get_matches_from(vec!["test", "--log-json", "-vv"]));
            assert_eq!(options, Options { verbosity: 2, json: true });
            },
        );
    }
}
