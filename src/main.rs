mod bus;
mod config;
mod db;
mod error;
mod models;
mod notify;
mod roster;
mod routes;
mod store;

use std::sync::Arc;

use crate::{
    bus::EventBus,
    config::Config,
    models::{AppState, EntityKind},
    notify::{SmsGateway, SmsLog},
    roster::{RosterFilter, live::LiveRoster},
    store::{BackingStore, PgStore},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;

    let bus = EventBus::new();
    let store: Arc<dyn BackingStore> = Arc::new(PgStore::new(pool, bus.clone()));
    let sms: Arc<dyn SmsGateway> = Arc::new(SmsLog::new(cfg.sms_sender.clone()));

    // process-lifetime rosters behind the admin screens; they subscribe
    // before their first snapshot so no change event is lost in between
    let appointment_roster = Arc::new(LiveRoster::start(
        Arc::clone(&store),
        &bus,
        EntityKind::Appointment,
        RosterFilter::All,
    ));
    let doctor_roster = Arc::new(LiveRoster::start(
        Arc::clone(&store),
        &bus,
        EntityKind::Doctor,
        RosterFilter::All,
    ));

    let state = AppState {
        store,
        sms,
        appointment_roster,
        doctor_roster,
    };

    // allow the browser frontend to call the API (OPTIONS preflight
    // otherwise returns 405 and blocks POSTs)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
