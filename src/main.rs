use clap::Parser;

use monarch_route::cli::Cli;
use monarch_route::ErrorKind;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // exit 1 for bad arguments, 2 only for corrupted datasets
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            let code = if error.use_stderr() { 1 } else { 0 };
            std::process::exit(code);
        }
    };

    if let Err(error) = cli.run() {
        eprintln!("error: {error:#}");
        let code = error
            .downcast_ref::<ErrorKind>()
            .map(ErrorKind::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
