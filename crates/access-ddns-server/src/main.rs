use access_ddns_server::{logging, serve, Cli};
use clap::Parser;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("fatal: {e:?}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = cli.build_state()?;
    serve(cli.bind, state).await
}
