use std::{
    fs::File,
    future,
    io::{self, BufReader, BufWriter},
    process,
    sync::Arc,
};

use ical_proxy::{
    application::{
        error::{AppError, error_chain},
        filter::{FilterStats, filter_calendar},
        registry::FeedRegistry,
    },
    config,
    infra::{error::InfraError, http, origin::HttpOrigin, telemetry},
};
use tokio::{net::TcpListener, signal};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = error_chain(error);

    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Check => run_check(&settings),
        config::Command::Filter(args) => run_filter(&settings, &args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let client = Arc::new(HttpOrigin::new(&settings.upstream)?);
    let registry = FeedRegistry::from_settings(&settings.calendars, client);
    if registry.is_empty() {
        warn!(
            target = "ical_proxy::serve",
            "no calendars configured; only the health check is served"
        );
    }

    let router = http::build_router(&registry);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "ical_proxy::serve",
        addr = %settings.server.addr,
        calendars = registry.len(),
        timeout_seconds = settings.upstream.timeout.map(|timeout| timeout.as_secs()),
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "ical_proxy::serve", "server stopped");
    Ok(())
}

fn run_check(settings: &config::Settings) -> Result<(), AppError> {
    for calendar in &settings.calendars {
        println!(
            "{} -> {} ({} rules)",
            calendar.path,
            calendar.origin,
            calendar.rules.len()
        );
    }

    info!(
        target = "ical_proxy::check",
        calendars = settings.calendars.len(),
        addr = %settings.server.addr,
        "configuration is valid"
    );
    Ok(())
}

fn run_filter(settings: &config::Settings, args: &config::FilterArgs) -> Result<(), AppError> {
    let calendar = settings.calendar(&args.calendar).ok_or_else(|| {
        AppError::validation(format!("no calendar is configured at `{}`", args.calendar))
    })?;

    let output = BufWriter::new(io::stdout().lock());
    let FilterStats { kept, dropped } = match args.file.as_ref() {
        Some(path) => {
            let file = File::open(path).map_err(InfraError::from)?;
            filter_calendar(BufReader::new(file), output, &calendar.rules)?
        }
        None => filter_calendar(io::stdin().lock(), output, &calendar.rules)?,
    };

    info!(
        target = "ical_proxy::filter",
        calendar = %calendar.path,
        kept,
        dropped,
        "calendar filtered"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target = "ical_proxy::serve", error = %err, "failed to listen for Ctrl-C");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "ical_proxy::serve", error = %err, "failed to listen for SIGTERM");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "ical_proxy::serve", "shutdown signal received");
}
