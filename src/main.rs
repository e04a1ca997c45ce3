use clap::Parser;
use sigtrader::cli::{run, Cli};
use sigtrader::logging::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    run(cli)
}
