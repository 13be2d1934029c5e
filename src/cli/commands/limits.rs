use clap::{Arg, ArgMatches, Command};

pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Options {
    /// Parse rate limit arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an argument is absent after defaults are applied.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let max_requests = matches
            .get_one::<u32>(ARG_RATE_LIMIT_MAX)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_RATE_LIMIT_MAX}"))?;
        let window_seconds = matches
            .get_one::<u64>(ARG_RATE_LIMIT_WINDOW_SECONDS)
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!("missing required argument: --{ARG_RATE_LIMIT_WINDOW_SECONDS}")
            })?;

        Ok(Self {
            max_requests,
            window_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("Requests allowed per client address within one window")
                .env("ACCOUNTD_RATE_LIMIT_MAX")
                .default_value("500")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Rate limit window length in seconds")
                .env("ACCOUNTD_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
