//! OpenSASE Store Sync - keeps back-office catalogs in step with remote stores

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_storesync::api::{self, AppState};
use opensase_storesync::audit::{AuditSink, NatsAuditSink, TracingAuditSink};
use opensase_storesync::config::AppConfig;
use opensase_storesync::remote::PlatformAdapters;
use opensase_storesync::repo::{MemoryRepositories, Repositories};
use opensase_storesync::sync::SyncOrchestrator;
use opensase_storesync::worker::{spawn_schedule_worker, BackgroundRunner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env().context("invalid configuration")?;

    let repos = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await.context("failed to connect to Postgres")?;
            sqlx::migrate!("./migrations").run(&db).await.context("failed to run migrations")?;
            Repositories::postgres(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory repositories; nothing will be persisted");
            MemoryRepositories::new().repositories()
        }
    };

    let audit: Arc<dyn AuditSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(subject = %config.audit_subject, "Publishing sync audit to NATS");
                Arc::new(NatsAuditSink::new(client, config.audit_subject.clone()))
            }
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, audit goes to the log only");
                Arc::new(TracingAuditSink)
            }
        },
        None => Arc::new(TracingAuditSink),
    };

    let orchestrator = SyncOrchestrator::new(
        repos,
        Arc::new(PlatformAdapters::new(config.sync.client_options())),
        audit,
        BackgroundRunner::new(config.sync.max_concurrent_phases),
        config.sync.orchestrator_settings()?,
    );

    if let Some(interval) = config.sync.schedule_interval {
        tracing::info!(interval_secs = interval.as_secs(), "Scheduled sync enabled");
        spawn_schedule_worker(orchestrator.clone(), interval);
    }

    let app = api::router(AppState { orchestrator });
    tracing::info!("🚀 OpenSASE Store Sync listening on {}", config.listen_addr);
    axum::serve(tokio::net::TcpListener::bind(config.listen_addr).await?, app).await?;
    Ok(())
}
