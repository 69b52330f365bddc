mod cli;
mod error;

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use claw_config::Config;
use claw_core::{
    CommandStream, Dispatch, Dispatcher, RouteTable, Target, TargetRegistry, commands_to_json,
};

use crate::cli::{CheckArgs, Cli, Command, CommandsArgs, GlobalOpts, SendArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load(&cli.global)?;
    match cli.command {
        Command::Run => serve(&config).await,
        Command::Check(args) => check(&config, &args).await,
        Command::Commands(args) => vocabulary(&config, &args).await,
        Command::Send(args) => send(&config, &args).await,
    }
}

fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global.config_path();
    debug!(path = %path.display(), "loading config");
    Ok(claw_config::load_config(&path)?)
}

// ── run ─────────────────────────────────────────────────────────────

/// Consume the command stream until ctrl-c or until every listener is gone.
async fn serve(config: &Config) -> Result<(), CliError> {
    let (listeners, targets) = claw_plugins::default_registries()?;
    let dispatcher = Dispatcher::setup(
        &targets,
        &config.target_specs(),
        Arc::new(config.route_table()),
    )?;

    let mut stream = CommandStream::new();
    for (name, spec) in config.listener_specs() {
        stream.add_listener(listeners.create(&name, &spec)?);
    }
    info!(
        listeners = stream.listener_count(),
        targets = dispatcher.target_names().count(),
        "claw started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("interrupted, shutting down");
                break;
            }

            event = stream.next() => {
                let Some(event) = event else { break };
                if let Some(err) = stream.take_error() {
                    warn!(error = %err, "listener error");
                }
                match dispatcher.dispatch(&event).await {
                    Ok(Dispatch::Sent { target, command }) => {
                        debug!(key = %event.key(), %target, %command, "dispatched");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(key = %event.key(), source = %event.source(), error = %e, "dispatch failed"),
                }
            }
        }
    }

    let fatal = stream.is_fatal();
    let pending = stream.take_error();
    stream.close().await;
    dispatcher.stop().await;

    if fatal {
        return Err(pending.map_or(CliError::StreamClosed, CliError::from));
    }
    if let Some(err) = pending {
        warn!(error = %err, "listener error");
    }
    Ok(())
}

// ── check ───────────────────────────────────────────────────────────

/// Build every plugin and validate every route without opening any
/// connection. Targets come from the offline registry, so no discovery
/// or polling task starts.
async fn check(config: &Config, args: &CheckArgs) -> Result<(), CliError> {
    let (listeners, targets) = claw_plugins::offline_registries()?;
    for (name, spec) in config.listener_specs() {
        listeners.create(&name, &spec)?;
    }
    let dispatcher = Dispatcher::setup(
        &targets,
        &config.target_specs(),
        Arc::new(RouteTable::new()),
    )?;

    let routes = config
        .routes
        .iter()
        .try_for_each(|r| dispatcher.validate(&r.target, &r.command, &r.args).map(drop));
    dispatcher.stop().await;
    routes?;

    if args.print {
        print!("{}", config.to_toml()?);
    } else {
        println!(
            "config ok: {} listener(s), {} target(s), {} route(s)",
            config.listeners.len(),
            config.targets.len(),
            config.routes.len()
        );
    }
    Ok(())
}

// ── commands / send ─────────────────────────────────────────────────

/// Build a single configured target. Nothing else is instantiated.
fn build_target(
    targets: &TargetRegistry,
    config: &Config,
    name: &str,
) -> Result<Arc<dyn Target>, CliError> {
    let specs = config.target_specs();
    let spec = specs.get(name).ok_or_else(|| CliError::UnknownTarget {
        name: name.to_owned(),
        available: specs.keys().cloned().collect::<Vec<_>>().join(", "),
    })?;
    Ok(Arc::from(targets.create(name, spec)?))
}

async fn vocabulary(config: &Config, args: &CommandsArgs) -> Result<(), CliError> {
    let (_, targets) = claw_plugins::offline_registries()?;
    let target = build_target(&targets, config, &args.target)?;
    let json = commands_to_json(target.commands());
    if let Err(e) = target.stop().await {
        debug!(error = %e, "target stop failed");
    }
    println!("{}", json?);
    Ok(())
}

async fn send(config: &Config, args: &SendArgs) -> Result<(), CliError> {
    let (_, targets) = claw_plugins::default_registries()?;
    let target = build_target(&targets, config, &args.target)?;
    let dispatcher = Dispatcher::new([target], Arc::new(RouteTable::new()));
    let result = dispatcher.send(&args.target, &args.command, &args.args).await;
    dispatcher.stop().await;
    result?;
    info!(target = %args.target, command = %args.command, "sent");
    Ok(())
}
