#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod cli;
mod console;
mod coordinator;
mod countdown;
mod log_line;
mod logger;
mod poweroff;
mod supervisor;

use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = cli::Cli::parse();
    logger::init(cli.verbose);
    print_banner(&cli);

    let config = supervisor::Config {
        server_jar: cli.server_jar,
        shutdown_enabled: cli.enable_shutdown,
        shutdown_delay: cli.shutdown_delay,
    };

    let result = supervisor::run(config).await;
    if let Err(err) = &result {
        error!("error occurred while supervising the server:\n{err:?}");
    }

    // Make sure pending log contents hit the disk before the process exits.
    log::logger().flush();

    if result.is_err() {
        std::process::exit(1);
    }
}

fn print_banner(cli: &cli::Cli) {
    println!("Server jar: '{}'", cli.server_jar.display());
    println!("Shutdown enabled: {}", cli.enable_shutdown);
    println!("Shutdown delay: {} seconds", cli.shutdown_delay.as_secs_f64());
    println!();
    println!(
        "Type '{}' or '{}' to allow/disallow players shutting down the server",
        console::ENABLE_SHUTDOWN_COMMAND,
        console::DISABLE_SHUTDOWN_COMMAND
    );
    println!(
        "Type '{}' to shut the server down",
        console::STOP_COMMAND
    );
    println!("You can also issue any normal server commands from this window");
    println!();
}
