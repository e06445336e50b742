use clap::Parser;
use gator_cli::commands::{cli, scrape, tasks};
use gator_core::api::{AppConfig, AppContext, GatorError, LoggingConfig, TaskError};
use gator_plugins::services::PluginServicesFactory;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

fn load_config(args: &cli::Args) -> Result<AppConfig, GatorError> {
    let cfg = match args.config.as_deref() {
        Some(path) => gator_core::config::load_from_path(std::path::Path::new(path)).map(|mut cfg| {
            gator_core::config::apply_env_overrides(&mut cfg);
            cfg
        }),
        None => gator_core::config::load_default(),
    };
    cfg.map_err(|e| GatorError::Config(e.to_string()))
}

async fn real_main() -> Result<i32, GatorError> {
    let args = cli::Args::parse();
    let cfg = load_config(&args)?;
    init_tracing(&cfg.logging).map_err(GatorError::Config)?;

    let ctx = AppContext::new(cfg, Arc::new(PluginServicesFactory)).await?;
    let exit = dispatch(args, &ctx).await;
    ctx.shutdown();
    exit
}

fn exit_code_for_error(e: &GatorError) -> i32 {
    // 0: success
    // 1: task ended FAILED or TIMED_OUT (returned as a normal exit code)
    // 11: config error
    // 20: host / store / IO error
    // 30: another task of the same kind is active
    // 50: internal/uncategorized
    match e {
        GatorError::Config(_) => 11,
        GatorError::Task(te) => match te {
            TaskError::Busy { .. } => 30,
            TaskError::NotFound(_) => 20,
            TaskError::Store(_) => 20,
            TaskError::InvalidTransition { .. } | TaskError::Terminal { .. } => 50,
        },
        GatorError::Host(_) => 20,
        GatorError::Io(_) => 20,
        GatorError::Command(_) => 20,
        GatorError::Anyhow(_) => 50,
    }
}

async fn dispatch(args: cli::Args, ctx: &AppContext) -> Result<i32, GatorError> {
    let json = args.json;
    match args.command {
        cli::Commands::Scrape(scrape_args) => {
            let _sweeper = ctx.start_sweeper();
            scrape::run_scrape(scrape_args, ctx, json).await
        }
        cli::Commands::Status => tasks::run_status(ctx, json).await,
        cli::Commands::Show { id } => tasks::run_show(ctx, &id, json).await,
        cli::Commands::Cancel { kind } => tasks::run_cancel(ctx, kind.into()).await,
        cli::Commands::Sweep => tasks::run_sweep(ctx).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("gator"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("gator.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
