// constconv entry point

use std::process::ExitCode;

use clap::Parser;
use constconv_cli::{init_logging, Cli, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exec_args: Vec<String> = std::env::args().skip(1).collect();
    match try_main(cli, &exec_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // stage errors already carry their causes
            eprintln!("constconv: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli, exec_args: &[String]) -> anyhow::Result<()> {
    let config = Config::from_cli(cli, exec_args)?;
    constconv_cli::run(&config)?;
    Ok(())
}
