use std::rc::Rc;

use clap::Parser;
use pond_core::{Database, RealSteadyClock, RealSystemClock};
use pond_server::admin::NoCredentials;
use pond_server::config::PondArgs;
use pond_server::instance::Instance;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pond: an in-memory append-only log-record store")]
struct Args {
    #[command(flatten)]
    pond: PondArgs,
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse().pond;

    // The storage engine and connection state are `Rc`/`RefCell`-based
    // (there is only ever the one cooperative-scheduling thread that
    // touches them), so this runs on a current-thread runtime plus a
    // `LocalSet` rather than tokio's default multi-thread executor.
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local = tokio::task::LocalSet::new();
    runtime.block_on(local.run_until(run(args)))
}

async fn run(args: PondArgs) -> eyre::Result<()> {
    let database = Database::new(args.database.size.as_u64() as usize, args.rate_limit());

    // Plain TCP carries no kernel-verified peer credential, and this stack
    // has no libc binding to read the running process's own uid;
    // `server_uid: 0` is inert here since `NoCredentials` never supplies a
    // peer uid to compare against it.
    let instance = Rc::new(Instance::new(
        database,
        Box::new(RealSteadyClock),
        Box::new(RealSystemClock),
        args.database.max_age_duration(),
        0,
    ));

    if args.auto_clone {
        let discovery = pond_server::auto_clone::NoDiscovery;
        pond_server::auto_clone::run(&instance, &discovery).await;
    }

    let udp_socket = pond_server::udp::bind(args.receiver)?;
    let tcp_listener = tokio::net::TcpListener::bind(args.listener).await?;
    tracing::info!(receiver = %args.receiver, listener = %args.listener, "pond-server starting");

    let credentials: Rc<dyn pond_server::admin::CredentialSource> = Rc::new(NoCredentials);

    let udp_task = tokio::task::spawn_local(pond_server::udp::run(instance.clone(), udp_socket));
    let tcp_task = tokio::task::spawn_local(pond_server::tcp::run(instance.clone(), tcp_listener, credentials));
    let retention_task = tokio::task::spawn_local(pond_server::retention::run(instance.clone()));
    let metrics_addr = args.metrics;
    let metrics_task = tokio::task::spawn_local(async move {
        if let Err(e) = pond_server::metrics_http::run(metrics_addr).await {
            tracing::error!(error = %e, "metrics endpoint stopped");
        }
    });
    tracing::info!(metrics = %metrics_addr, "metrics endpoint starting");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down on Ctrl-C");
        }
        _ = terminate_signal() => {
            tracing::info!("shutting down on SIGTERM");
        }
    }

    udp_task.abort();
    tcp_task.abort();
    retention_task.abort();
    metrics_task.abort();
    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(_) => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending().await
}
