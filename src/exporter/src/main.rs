// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Prometheus exporter for local volume convert, expand and migrate
//! operations.

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use prometheus::Registry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hwameistor_operation_metrics::crd::local_volume_convert::v1alpha1::LocalVolumeConvert;
use hwameistor_operation_metrics::crd::local_volume_expand::v1alpha1::LocalVolumeExpand;
use hwameistor_operation_metrics::crd::local_volume_migrate::v1alpha1::LocalVolumeMigrate;
use hwameistor_operation_metrics::kind::{Convert, Expand, Migrate, OperationKind};
use hwameistor_operation_metrics::registry::{OperationMetrics, OperationStores};
use hwameistor_operation_metrics::store::kubernetes::ReflectorSnapshotStore;

mod http;

/// Serves metrics for local volume maintenance operations.
#[derive(clap::Parser, Debug)]
#[clap(name = "hwameistor-exporter", version)]
struct Args {
    /// The address on which to serve `/metrics`.
    #[clap(
        long,
        env = "HWAMEISTOR_EXPORTER_LISTEN_ADDR",
        value_name = "HOST:PORT",
        default_value = "0.0.0.0:8080"
    )]
    listen_addr: SocketAddr,
    /// The kubeconfig context to use. Uses the in-cluster configuration, or
    /// the kubeconfig's current context, if absent.
    #[clap(long, env = "HWAMEISTOR_EXPORTER_KUBERNETES_CONTEXT", value_name = "CONTEXT")]
    kubernetes_context: Option<String>,
    /// Which log events to emit, as a `tracing` filter directive.
    #[clap(
        long,
        env = "HWAMEISTOR_EXPORTER_LOG_FILTER",
        value_name = "FILTER",
        default_value = "info"
    )]
    log_filter: String,
    /// How long to wait for the operation caches to sync before serving.
    /// Kinds that have not synced report nothing until they do.
    #[clap(
        long,
        env = "HWAMEISTOR_EXPORTER_INITIAL_SYNC_TIMEOUT",
        value_parser = humantime::parse_duration,
        default_value = "60s"
    )]
    initial_sync_timeout: Duration,
}

#[tokio::main]
async fn main() {
    let args: Args = clap::Parser::parse();
    if let Err(err) = run(args).await {
        eprintln!("hwameistor-exporter: fatal: {:#}", err);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_new(&args.log_filter).context("parsing --log-filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = create_client(args.kubernetes_context)
        .await
        .context("creating kubernetes client")?;

    let convert = ReflectorSnapshotStore::spawn(
        Convert::NAME,
        Api::<LocalVolumeConvert>::all(client.clone()),
    );
    let expand = ReflectorSnapshotStore::spawn(
        Expand::NAME,
        Api::<LocalVolumeExpand>::all(client.clone()),
    );
    let migrate =
        ReflectorSnapshotStore::spawn(Migrate::NAME, Api::<LocalVolumeMigrate>::all(client));

    let timeout = args.initial_sync_timeout;
    let synced = tokio::join!(
        convert.wait_until_synced(timeout),
        expand.wait_until_synced(timeout),
        migrate.wait_until_synced(timeout),
    );
    for (kind, synced) in [
        (Convert::NAME, synced.0),
        (Expand::NAME, synced.1),
        (Migrate::NAME, synced.2),
    ] {
        if !synced {
            warn!("{kind} cache not synced after {timeout:?}, serving anyway");
        }
    }

    let registry = Registry::new();
    OperationMetrics::new(OperationStores {
        convert: Arc::new(convert),
        expand: Arc::new(expand),
        migrate: Arc::new(migrate),
    })
    .context("defining operation metrics")?
    .register_into(&registry)
    .context("registering operation metrics")?;

    let listener = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .with_context(|| format!("binding to {}", args.listen_addr))?;
    info!("serving metrics on http://{}/metrics", args.listen_addr);
    axum::serve(listener, http::router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving metrics")?;
    info!("shut down");
    Ok(())
}

/// Creates a Kubernetes client, from the named kubeconfig context if one is
/// given and from the inferred configuration otherwise.
async fn create_client(context: Option<String>) -> Result<Client, anyhow::Error> {
    let config = match context {
        Some(context) => Config::from_kubeconfig(&KubeConfigOptions {
            context: Some(context),
            ..Default::default()
        })
        .await
        .context("loading kubeconfig")?,
        None => Config::infer()
            .await
            .context("inferring kubernetes configuration")?,
    };
    Ok(Client::try_from(config)?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
