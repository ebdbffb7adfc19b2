mod config;

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth_adapters::persistence::sqlite::SqliteDb;
use hearth_app::incident_service::IncidentService;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = SqliteDb::with_options(
        &config.database_url,
        config.max_connections,
        config.incident_ttl(),
    )
    .await?;
    info!(
        database_url = %config.database_url,
        incident_ttl_secs = config.incident_ttl_secs,
        "incident store ready"
    );

    let service = IncidentService::new(db.clone(), db);

    let mut sweep = tokio::time::interval(config.purge_interval());
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if let Err(e) = service.purge_expired(Utc::now()).await {
                    error!(error = %e, "retention sweep failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
