use crate::cli::ServeArgs;
use crate::infra::{seed_demo_store, AppState};
use crate::routes::with_registration_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use festival::config::AppConfig;
use festival::error::AppError;
use festival::registration::{
    FestivalStore, MemoryFestivalStore, RegistrationService, SqliteFestivalStore,
};
use festival::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database = Some(database);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = match &config.storage.database {
        Some(path) => {
            info!(database = %path.display(), "opening sqlite festival store");
            registration_app(Arc::new(SqliteFestivalStore::open(path)?), args.demo_data)?
        }
        None => {
            info!("using in-memory festival store");
            registration_app(Arc::new(MemoryFestivalStore::new()), args.demo_data)?
        }
    };
    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "festival eligibility service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn registration_app<S>(store: Arc<S>, demo_data: bool) -> Result<Router, AppError>
where
    S: FestivalStore + 'static,
{
    if demo_data {
        let seeded = seed_demo_store(store.as_ref())?;
        info!(
            houses = seeded.houses.len(),
            students = seeded.students.len(),
            events = seeded.events.len(),
            "demo festival ready"
        );
    }
    let service = Arc::new(RegistrationService::new(store));
    Ok(with_registration_routes(service))
}
