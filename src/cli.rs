use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

const AFTER_HELP: &str = color_print::cstr!(
    "Once the server is up, type '<bold>enable shutdown</bold>' or '<bold>disable shutdown</bold>' \
     to allow or disallow player-issued shutdowns; every other input line is forwarded to the \
     server console."
);

#[derive(Parser, Debug)]
#[command(name = "mcwarden")]
#[command(about = "A console warden for self-hosted Minecraft servers")]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to the server jar to launch.
    pub server_jar: PathBuf,

    /// Let players shut the server down (and power off the host) with the
    /// in-game chat commands.
    #[arg(long)]
    pub enable_shutdown: bool,

    /// Delay between a shutdown request and the actual server stop.
    #[arg(long, value_name = "SECONDS", default_value = "30", value_parser = parse_delay)]
    pub shutdown_delay: Duration,

    /// Log diagnostic details.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_delay(text: &str) -> Result<Duration, String> {
    let seconds: f64 = text
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("the delay must be a non-negative number of seconds".to_owned());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("'{text}' is too large for a delay"))
}
