use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use readiness_gate::config::{self, SinkKind, DEFAULT_CONFIG_PATH};
use readiness_gate::controller::{self, GateStateStore};
use readiness_gate::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Gate rule file (.json, .yaml or .toml)
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Namespace the operator and its webhook Service run in
    #[arg(long, env = "POD_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Service name fronting the admission webhook
    #[arg(long, env = "WEBHOOK_SERVICE_NAME", default_value = "readiness-gate")]
    webhook_service: String,

    /// MutatingWebhookConfiguration that receives the CA bundle
    #[arg(long, env = "WEBHOOK_CONFIG_NAME", default_value = "readiness-gate-webhook")]
    webhook_config: String,

    #[arg(long, env = "WEBHOOK_ADDR", default_value = "0.0.0.0:8443")]
    webhook_addr: SocketAddr,

    #[arg(long, env = "STATUS_ADDR", default_value = "0.0.0.0:8080")]
    status_addr: SocketAddr,

    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,

    /// Directory the webhook TLS certificate and key are written to
    #[arg(long, env = "CERT_DIR", default_value = "/tmp")]
    cert_dir: PathBuf,

    /// Sink for rules that do not choose one
    #[arg(long, env = "DEFAULT_SINK", value_enum, default_value_t = SinkKind::PodCondition)]
    default_sink: SinkKind,

    /// Do not start the admission webhook
    #[arg(long, env = "DISABLE_WEBHOOK")]
    disable_webhook: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("readiness-gate-operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

/// Cancel `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping");
    token.cancel();
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing();

    // reqwest and axum-server pull in different rustls backends
    #[cfg(feature = "admission-webhook")]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    info!(
        "Starting readiness-gate operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let rules = config::load_rules(&args.config)?;
    info!(
        count = rules.len(),
        path = %args.config.display(),
        "Loaded gate rules"
    );

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    let store = GateStateStore::new();
    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    let mut servers: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    #[cfg(feature = "rest-api")]
    {
        let (addr, store, token) = (args.status_addr, store.clone(), token.clone());
        servers.push(tokio::spawn(async move {
            if let Err(e) = readiness_gate::rest_api::run_status_server(addr, store, token).await {
                error!("Status server error: {}", e);
            }
        }));
    }

    #[cfg(all(feature = "rest-api", feature = "metrics"))]
    {
        let (addr, token) = (args.metrics_addr, token.clone());
        servers.push(tokio::spawn(async move {
            if let Err(e) = readiness_gate::rest_api::run_metrics_server(addr, token).await {
                error!("Metrics server error: {}", e);
            }
        }));
    }

    #[cfg(feature = "admission-webhook")]
    {
        use readiness_gate::webhook::{start_webhook, WebhookSettings};

        if args.disable_webhook {
            info!("Admission webhook disabled");
        } else {
            let mut settings = WebhookSettings::new(
                args.webhook_addr,
                &args.webhook_service,
                &args.namespace,
                &args.webhook_config,
            );
            settings.cert_dir = args.cert_dir.clone();
            let (client, token) = (client.clone(), token.clone());
            servers.push(tokio::spawn(async move {
                if let Err(e) = start_webhook(client, settings, token).await {
                    error!("Admission webhook disabled after startup failure: {}", e);
                }
            }));
        }
    }

    controller::run_gates(rules, client, store, args.default_sink, token.clone()).await;

    // Servers only stop on cancellation
    token.cancelled().await;
    for result in join_all(servers).await {
        if let Err(e) = result {
            error!("Server task failed: {}", e);
        }
    }

    info!("Operator stopped");
    Ok(())
}
