mod telemetry;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hail_core::config::Config;
use hail_core::model::Person;
use hail_services::client::HttpClient;
use hail_services::orchestrator::{Backend, Orchestrator};
use hail_services::{directory, formatter, orchestrator};
use hail_store::Store;

use crate::telemetry::{init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "hail")]
#[command(about = "Traced hello-greeting service chain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Serve one or more hail services until ctrl-c")]
    Run {
        #[arg(help = "directory, formatter, orchestrator, all, or mono")]
        service: String,
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        orchestrator_addr: Option<String>,
        #[arg(long)]
        directory_addr: Option<String>,
        #[arg(long)]
        formatter_addr: Option<String>,
        #[arg(long)]
        directory_url: Option<String>,
        #[arg(long)]
        formatter_url: Option<String>,
    },
    #[command(about = "Insert or update one person record")]
    Seed {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            service,
            db_path,
            orchestrator_addr,
            directory_addr,
            formatter_addr,
            directory_url,
            formatter_url,
        } => {
            let service = parse_service(&service)?;
            run_services(
                service,
                RunOverrides {
                    db_path,
                    orchestrator_addr,
                    directory_addr,
                    formatter_addr,
                    directory_url,
                    formatter_url,
                },
            )
            .await
        }
        Commands::Seed {
            name,
            title,
            description,
            db_path,
        } => run_seed(
            db_path,
            Person {
                name,
                title,
                description,
            },
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceSet {
    Directory,
    Formatter,
    Orchestrator,
    All,
    Mono,
}

impl ServiceSet {
    fn label(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Formatter => "formatter",
            Self::Orchestrator => "orchestrator",
            Self::All => "all",
            Self::Mono => "mono",
        }
    }

    fn tracing_name(self) -> &'static str {
        match self {
            Self::Directory => "hail-directory",
            Self::Formatter => "hail-formatter",
            Self::Orchestrator => "hail-orchestrator",
            Self::All => "hail",
            Self::Mono => "hail-mono",
        }
    }
}

fn parse_service(s: &str) -> anyhow::Result<ServiceSet> {
    match s {
        "directory" => Ok(ServiceSet::Directory),
        "formatter" => Ok(ServiceSet::Formatter),
        "orchestrator" => Ok(ServiceSet::Orchestrator),
        "all" => Ok(ServiceSet::All),
        "mono" => Ok(ServiceSet::Mono),
        other => anyhow::bail!(
            "unknown service: {other} (expected directory, formatter, orchestrator, all, or mono)"
        ),
    }
}

#[derive(Debug, Default)]
struct RunOverrides {
    db_path: Option<PathBuf>,
    orchestrator_addr: Option<String>,
    directory_addr: Option<String>,
    formatter_addr: Option<String>,
    directory_url: Option<String>,
    formatter_url: Option<String>,
}

fn apply_cli_overrides(cfg: &mut Config, overrides: RunOverrides) {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.orchestrator_addr {
        cfg.orchestrator_addr = v;
    }
    if let Some(v) = overrides.directory_addr {
        cfg.directory_addr = v;
    }
    if let Some(v) = overrides.formatter_addr {
        cfg.formatter_addr = v;
    }
    if let Some(v) = overrides.directory_url {
        cfg.directory_url = v;
    }
    if let Some(v) = overrides.formatter_url {
        cfg.formatter_url = v;
    }
}

async fn run_services(service: ServiceSet, overrides: RunOverrides) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    apply_cli_overrides(&mut cfg, overrides);
    init_run_tracing(service.tracing_name());

    let mut store: Option<Store> = None;
    let mut routers: Vec<(String, axum::Router)> = Vec::new();

    match service {
        ServiceSet::Directory => {
            let s = Store::open(&cfg.db_path).context("open person store")?;
            routers.push((cfg.directory_addr.clone(), directory::router(s.clone())));
            store = Some(s);
        }
        ServiceSet::Formatter => {
            routers.push((cfg.formatter_addr.clone(), formatter::router()));
        }
        ServiceSet::Orchestrator => {
            routers.push((cfg.orchestrator_addr.clone(), remote_orchestrator(&cfg)?));
        }
        ServiceSet::All => {
            let s = Store::open(&cfg.db_path).context("open person store")?;
            routers.push((cfg.directory_addr.clone(), directory::router(s.clone())));
            routers.push((cfg.formatter_addr.clone(), formatter::router()));
            routers.push((cfg.orchestrator_addr.clone(), remote_orchestrator(&cfg)?));
            store = Some(s);
        }
        ServiceSet::Mono => {
            let s = Store::open(&cfg.db_path).context("open person store")?;
            let orchestrator = Orchestrator::new(Backend::Local { store: s.clone() });
            routers.push((
                cfg.orchestrator_addr.clone(),
                orchestrator::router(orchestrator),
            ));
            store = Some(s);
        }
    }

    eprintln!("hail run {}", service.label());
    if store.is_some() {
        eprintln!("  db: {}", cfg.db_path.display());
    }

    let mut servers = tokio::task::JoinSet::new();
    for (addr, router) in routers {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        eprintln!("  listening on http://{addr}");
        servers.spawn(async move { axum::serve(listener, router).await });
    }

    tokio::select! {
        res = servers.join_next() => {
            if let Some(res) = res {
                res.context("server task join failed")?
                    .context("server failed")?;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    servers.abort_all();
    while servers.join_next().await.is_some() {}

    if let Some(store) = store {
        store.close().context("close person store")?;
    }
    shutdown_tracing();
    Ok(())
}

fn remote_orchestrator(cfg: &Config) -> anyhow::Result<axum::Router> {
    let client = HttpClient::new(cfg.http_timeout).context("build outbound http client")?;
    let orchestrator = Orchestrator::new(Backend::Remote {
        client,
        directory_url: cfg.directory_url.clone(),
        formatter_url: cfg.formatter_url.clone(),
    });
    Ok(orchestrator::router(orchestrator))
}

fn run_seed(db_path: Option<PathBuf>, person: Person) -> anyhow::Result<()> {
    init_cli_tracing();
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = db_path {
        cfg.db_path = v;
    }

    let store = Store::open(&cfg.db_path).context("open person store")?;
    store.upsert_person(&person)?;
    store.close()?;
    eprintln!("seeded {}", person.name);
    Ok(())
}
