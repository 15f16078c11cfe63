/*!
The `nest` accounts server.

    nest [ CONFIG_FILE ]

`CONFIG_FILE` defaults to `config.toml`; log verbosity comes from the
`LOG_LEVEL` environment variable.
*/
use std::sync::Arc;

use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use nest::config;
use nest::inter;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Unable to listen for Ctrl+C: {}", &e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; },
            Err(e) => {
                log::error!("Unable to listen for SIGTERM: {}", &e);
                std::future::pending::<()>().await;
            },
        }
        log::info!("Received terminate signal, shutting down.");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("nest")
        .build();
    if let Err(e) = TermLogger::init(
        nest::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ) {
        eprintln!("Unable to start logging: {}", &e);
    }
    log::info!("Logging started.");

    let cfg_path = std::env::args().nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_owned());
    let glob = match config::load_configuration(&cfg_path).await {
        Ok(glob) => Arc::new(glob),
        Err(e) => {
            log::error!("Error loading configuration from {:?}: {}", &cfg_path, &e);
            std::process::exit(1);
        },
    };
    log::info!("Configuration:\n{:#?}", &glob);

    let addr = glob.addr;
    let app = inter::app(glob);

    log::info!("Listening on {}", &addr);

    let server = match axum::Server::try_bind(&addr) {
        Ok(builder) => builder,
        Err(e) => {
            log::error!("Unable to bind {}: {}", &addr, &e);
            std::process::exit(1);
        },
    };
    if let Err(e) = server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", &e);
        std::process::exit(1);
    }

    log::info!("Server shut down.");
}
