use std::sync::Arc;

use todo_authz::authz::SecurityCatalog;
use todo_authz::config::{ProviderConfig, ProviderKind};
use todo_authz::provider::{AdminApi, InMemoryProvider, KeycloakClient, ProtectionApi};
use todo_authz::seed::Seeder;
use todo_authz::{app, db, docs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    let provider_config = ProviderConfig::from_env()?;
    let client_id = provider_config.client_id.clone();

    let (protection, admin): (Arc<dyn ProtectionApi>, Arc<dyn AdminApi>) = match provider_config.kind {
        ProviderKind::Keycloak => {
            tracing::info!(
                base_url = %provider_config.base_url,
                realm = %provider_config.realm,
                "using keycloak authorization provider"
            );
            let client = Arc::new(KeycloakClient::new(provider_config.clone())?);
            (client.clone() as Arc<dyn ProtectionApi>, client as Arc<dyn AdminApi>)
        }
        ProviderKind::Memory => {
            tracing::warn!("using in-memory authorization provider; decisions are not shared across instances");
            let provider = Arc::new(InMemoryProvider::new(SecurityCatalog::todo()?));
            (provider.clone() as Arc<dyn ProtectionApi>, provider as Arc<dyn AdminApi>)
        }
    };

    if provider_config.seed_on_start {
        let report = Seeder::new(admin, SecurityCatalog::todo()?, client_id).run().await;
        if report.is_clean() {
            tracing::info!(
                created = report.created.len(),
                existing = report.existing.len(),
                "authorization provider seeded"
            );
        } else {
            tracing::warn!(
                failures = report.failures.len(),
                skipped = report.skipped.len(),
                "authorization provider seeding incomplete, continuing"
            );
        }
    }

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let openapi = docs::build_openapi(port)?;
    let app = app::create_app(pool, protection).await?.merge(docs::swagger_routes(openapi)?);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
