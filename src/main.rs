mod cli;
mod config;

use anyhow::{Context, Result, bail};
use certgen::server::hello_router;
use clap::Parser;
use log::{error, info};

fn main() {
    // Initialize logger with custom format
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let file = config::load(args.config.as_deref())?;

    match args.sub.unwrap_or(cli::Cmd::Generate) {
        cli::Cmd::Generate => {
            let settings = config::Settings::resolve(&args.cert, None, file)?;
            run_generate(&settings)
        }
        cli::Cmd::Serve { addr } => {
            let settings = config::Settings::resolve(&args.cert, addr, file)?;
            run_serve(settings)
        }
    }
}

fn run_generate(settings: &config::Settings) -> Result<()> {
    if !settings.hosts_given {
        bail!("Missing required --host parameter");
    }

    info!(
        "Generating {} certificate for {}",
        settings.params.key_algorithm,
        settings.params.hosts.join(",")
    );
    certgen::generate_to_file(&settings.params, &settings.cert_file, &settings.key_file)
        .context("Failed to generate certificate")?;
    Ok(())
}

fn run_serve(settings: config::Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    rt.block_on(async move {
        let handle = axum_server::Handle::new();

        let shutdown = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down");
                shutdown.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
            }
        });

        certgen::serve_tls_with_handle(
            settings.addr,
            hello_router(),
            Some(settings.params),
            handle,
        )
        .await
        .context("HTTPS server failed")
    })
}
