// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use axum::{routing::get, Router};
use clap::Parser;
use extipy::{
    config::Config,
    constants::{HEALTHZ_SERVER_PATH, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    controller::Controller,
    metrics,
    plan::PlanPolicy,
    provider::{
        ClusterExtIpProvider, DnsProvider, DomainFilter, FirewallProvider, InMemoryDnsProvider,
        InMemoryFirewallProvider,
    },
    registry::{DnsRegistry, ExtIpRegistry, FirewallRegistry, NoopRegistry, TxtRegistry},
    source::{by_names, MultiSource, SourceConfig},
};
use kube::Client;
use tokio::sync::watch;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build the Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("extipy-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with the configured level and format
///
/// Respects the `RUST_LOG` environment variable if set, otherwise falls back
/// to the configured log level.
fn initialize_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting external IPs controller");
}

/// Start the metrics and health HTTP server
///
/// Serves Prometheus metrics and a liveness endpoint on the configured bind
/// address.
fn start_metrics_server(bind_address: String) -> tokio::task::JoinHandle<()> {
    info!(%bind_address, "Starting metrics HTTP server");

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {e}");
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        async fn healthz_handler() -> &'static str {
            "OK"
        }

        let app = Router::new()
            .route(METRICS_SERVER_PATH, get(metrics_handler))
            .route(HEALTHZ_SERVER_PATH, get(healthz_handler));

        let listener = match tokio::net::TcpListener::bind(&bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_address}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_address}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Close the stop channel on SIGINT or SIGTERM
///
/// The controller loop reads the channel at its select point; a tick in
/// progress runs to completion before the loop exits.
fn spawn_signal_handler(stop_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let sigterm = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => error!("Failed to install SIGTERM handler: {e}"),
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for SIGINT: {e}");
                }
                info!("Received SIGINT (Ctrl+C), terminating...");
            }
            () = sigterm => {
                info!("Received SIGTERM, terminating...");
            }
        }
        let _ = stop_tx.send(true);
    });
}

/// Build the configured DNS and firewall providers.
fn build_providers(
    config: &Config,
) -> Result<(Box<dyn DnsProvider>, Box<dyn FirewallProvider>)> {
    match config.provider.as_str() {
        "inmemory" => {
            let domain_filter = DomainFilter::new(config.domain_filter.clone());
            Ok((
                Box::new(InMemoryDnsProvider::new(domain_filter)),
                Box::new(InMemoryFirewallProvider::new(
                    config.inmemory_cluster_name.clone(),
                )),
            ))
        }
        other => bail!("unknown provider: {other}"),
    }
}

/// Wrap the DNS provider in the configured registry.
fn build_dns_registry(
    config: &Config,
    provider: Box<dyn DnsProvider>,
) -> Result<Box<dyn DnsRegistry>> {
    match config.registry.as_str() {
        "noop" => Ok(Box::new(NoopRegistry::new(provider))),
        "txt" => Ok(Box::new(TxtRegistry::new(
            provider,
            &config.txt_prefix,
            &config.txt_owner_id,
            config.txt_cache_interval,
        )?)),
        other => bail!("unknown registry: {other}"),
    }
}

async fn async_main() -> Result<()> {
    let config = Config::parse();

    initialize_logging(&config);
    debug!(?config, "parsed configuration");

    config.validate().context("config validation failed")?;

    if config.dry_run {
        info!("running in dry-run mode, no changes will be applied");
    }

    let _metrics_handle = start_metrics_server(config.metrics_address.clone());

    let client = Client::try_default()
        .await
        .context("initializing Kubernetes client")?;

    let (dns_provider, firewall_provider) = build_providers(&config)?;

    // The cluster identifier namespaces rule-set names; it comes from the
    // firewall provider's view of the node set.
    let cluster_name = firewall_provider
        .cluster_name()
        .await
        .context("deriving cluster name")?;
    info!(%cluster_name, "derived cluster name");

    let source_config = SourceConfig {
        namespace: config.namespace_option(),
        annotation_filter: config.annotation_filter.clone(),
        fqdn_template: config.fqdn_template.clone(),
        combine_fqdn_and_annotation: config.combine_fqdn_annotation,
        publish_internal: config.publish_internal,
    };
    let sources = by_names(&client, &config.sources, &source_config, &cluster_name)?;
    let source = MultiSource::new(sources);

    let dns_registry = build_dns_registry(&config, dns_provider)?;
    let firewall_registry = FirewallRegistry::new(firewall_provider);
    let extip_registry = ExtIpRegistry::new(Box::new(ClusterExtIpProvider::new(
        client,
        config.namespace_option(),
        config.dry_run,
    )));

    let policy: PlanPolicy = config
        .policy
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let controller = Controller {
        source: Box::new(source),
        dns_registry,
        firewall_registry,
        extip_registry,
        policy,
        interval: config.interval,
    };

    if config.once {
        return controller.run_once().await;
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    spawn_signal_handler(stop_tx);
    controller.run(stop_rx).await;

    Ok(())
}
