// rosidl-codegen CLI Entry Point

use clap::Parser;
use rosidl_codegen_cli::{init_logging, run, Cli};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    match run(&cli) {
        Ok(generated) => {
            tracing::debug!(files = generated.len(), "Done");
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
