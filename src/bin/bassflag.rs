use bassflag::execute_with_options;
use bassflag::{extract_options, CliData};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(ansi: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}

fn main() {
    let is_terminal = atty::is(atty::Stream::Stdout);
    init_logging(is_terminal);

    let args = CliData::parse();
    let options = match extract_options(args, is_terminal) {
        Ok(oop) => oop,
        Err(error) => {
            tracing::error!("{}", error);
            std::process::exit(2);
        }
    };
    if let Err(error) = execute_with_options(options) {
        tracing::error!("{}", error);
        std::process::exit(1);
    }
    std::process::exit(0);
}
