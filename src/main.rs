use clap::Parser;
use spectrum_scope::cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The terminal view owns stderr's screen too; keep it quiet unless asked
    let default_filter = if cli.headless || cli.list_devices { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    match spectrum_scope::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("spectrum-scope: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
