use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "quota-manager.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    qm_server::telemetry::init();

    let config_path =
        std::env::var("QM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config = qm_server::load_config(&config_path)?;

    let ctx = qm_server::build(&config).await?;
    let mut scheduler = ctx.scheduler;
    let scheduler_shutdown = ctx.scheduler_shutdown;

    let scheduler_handle = tokio::spawn(async move {
        info!("scheduler starting");
        scheduler.run().await;
    });

    let listener = tokio::net::TcpListener::bind(&ctx.server_addr)
        .await
        .map_err(|source| qm_server::ServerError::Bind { addr: ctx.server_addr.clone(), source })?;
    info!(address = %ctx.server_addr, "quota-manager listening");

    let app = qm_server::health::router(ctx.health_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = scheduler_shutdown.send(()).await;
        })
        .await
        .map_err(qm_server::ServerError::Http)?;

    scheduler_handle.await?;
    info!("quota-manager shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then trigger graceful shutdown of
/// both the HTTP listener and (via the sender awaited alongside it) the
/// background scheduler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
