use std::sync::Arc;

use adapters::callback::HttpCallbackSink;
use adapters::checker::{DnsChecker, HttpChecker, RdapChecker, WhoisChecker};
use adapters::http::{AppState, run_http_server};
use adapters::list::HttpListSource;
use adapters::state::FileStateStore;
use application::check_runner::CheckRunner;
use application::monitor::{DomainMonitor, MonitorSettings};
use application::ratelimit_gate::RateLimiter;
use infrastructure::config::MonitorConfig;
use infrastructure::logging::init_logging;
use infrastructure::metrics::MonitorMetrics;
use ports::secondary::callback_sink::CallbackSink;
use ports::secondary::checker::Checker;
use ports::secondary::list_source::DomainListSource;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::state_store::StateStore;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::shutdown::create_shutdown_token;

/// Run the monitor daemon startup sequence and block until shutdown.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = MonitorConfig::from_env()?;

    // ── 2. Initialize logging ───────────────────────────────────────
    // CLI flags take precedence over the environment
    let log_level = cli.log_level.unwrap_or(config.log_level);
    let log_format = cli.log_format.unwrap_or(config.log_format);
    init_logging(log_level, log_format);

    // Service root span — fields appear in every subsequent log entry
    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "domainwatch",
        service.version = env!("CARGO_PKG_VERSION"),
        instance_id = %config.instance_id,
    )
    .entered();

    info!(
        log_level = log_level.as_str(),
        log_format = log_format.as_str(),
        workers = config.workers,
        list_api = %config.list_api.url,
        "domainwatch agent starting"
    );

    // ── 3. Metrics registry ─────────────────────────────────────────
    let metrics = Arc::new(MonitorMetrics::new());
    let metrics_port: Arc<dyn MetricsPort> = Arc::clone(&metrics) as Arc<dyn MetricsPort>;

    // ── 4. Rate limiter: one bucket per service class ───────────────
    let classes = infrastructure::config::RateConfig::CLASSES.map(|class| {
        let bucket = config
            .rates
            .bucket(class)
            .expect("static class names are always known");
        (class.to_string(), bucket)
    });
    let limiter = Arc::new(RateLimiter::new(classes, Arc::clone(&metrics_port)));
    info!(
        dns_per_min = config.rates.dns,
        http_per_min = config.rates.http,
        rdap_per_min = config.rates.rdap,
        whois_per_min = config.rates.whois,
        "rate limiter initialized"
    );

    // ── 5. Oracle checkers ──────────────────────────────────────────
    let checkers: Vec<Arc<dyn Checker>> = vec![
        Arc::new(DnsChecker::new()),
        Arc::new(HttpChecker::new()?),
        Arc::new(RdapChecker::new()?),
        Arc::new(WhoisChecker::new()),
    ];
    let runner = CheckRunner::new(
        checkers,
        Arc::clone(&limiter),
        Arc::clone(&metrics_port),
        config.check_timeout,
    );

    // ── 6. Callback client, list source, state store ────────────────
    let sink: Arc<dyn CallbackSink> = Arc::new(HttpCallbackSink::new(
        config.callback.url.clone(),
        config.callback.available_url.clone(),
        config.callback.auth_token.clone(),
        config.callback.timeout,
        config.callback.max_retries,
        Arc::clone(&limiter),
        Arc::clone(&metrics_port),
    )?);

    let list_source: Arc<dyn DomainListSource> = Arc::new(HttpListSource::new(
        config.list_api.url.clone(),
        config.callback.auth_token.clone(),
        config.callback.timeout,
        Arc::clone(&limiter),
    )?);

    let state_store: Arc<dyn StateStore> = Arc::new(
        FileStateStore::new(
            &config.state.dir,
            config.instance_id.clone(),
            Arc::clone(&metrics_port),
        )
        .await?,
    );
    info!(state_dir = %config.state.dir.display(), "state store initialized");

    // ── 7. Build the monitor ────────────────────────────────────────
    let settings = MonitorSettings {
        instance_id: config.instance_id.clone(),
        cadence: config.cadence_policy(),
        workers: config.workers,
        snapshot_interval: config.state.snapshot_interval,
        shutdown_grace: config.shutdown_grace,
    };
    let (monitor, handle) = DomainMonitor::new(
        settings,
        runner,
        sink,
        list_source,
        state_store,
        metrics_port,
        config.list_api.refresh_interval,
    );

    // ── 8. Shutdown token and ops API server ────────────────────────
    let token = create_shutdown_token();

    let app_state = Arc::new(AppState::new(handle, metrics));
    let server = {
        let token = token.clone();
        let bind = config.http.bind_address.clone();
        let port = config.http.port;
        tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            run_http_server(app_state, &bind, port, shutdown).await
        })
    };

    // ── 9. Run until a signal arrives ───────────────────────────────
    monitor.run(token).await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "ops API server exited with error"),
        Err(e) => warn!(error = %e, "ops API server task panicked"),
    }

    info!("domainwatch agent stopped");
    Ok(())
}
