use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use halador_account::{AccountService, ReviewLedger, SubscriptionGate};
use halador_api::state::{AppState, AuthConfig};
use halador_booking::RequestLedger;
use halador_catalog::{CatalogRules, TripCatalog};
use halador_core::identity::{IdentityProvider, MemoryIdentity};
use halador_core::repository::{
    ListingCache, ProfileRepository, RateLimiter, ReviewRepository, TripRepository,
    TripRequestRepository,
};
use halador_store::{
    PgProfileRepository, PgReviewRepository, PgTripRepository, PgTripRequestRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halador_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = halador_store::app_config::Config::load()?;
    tracing::info!("Starting Halador API on port {}", config.server.port);

    // Postgres
    let db = halador_store::DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    // Redis (listing cache + rate limiting)
    let redis = Arc::new(halador_store::RedisClient::new(&config.redis.url).await?);
    let cache: Arc<dyn ListingCache> = redis.clone();
    let limiter: Arc<dyn RateLimiter> = redis.clone();

    // Repositories
    let profiles: Arc<dyn ProfileRepository> =
        Arc::new(PgProfileRepository::new(db.pool.clone()));
    let trips: Arc<dyn TripRepository> = Arc::new(PgTripRepository::new(db.pool.clone()));
    let requests: Arc<dyn TripRequestRepository> =
        Arc::new(PgTripRequestRepository::new(db.pool.clone()));
    let reviews: Arc<dyn ReviewRepository> = Arc::new(PgReviewRepository::new(db.pool.clone()));

    // Identity collaborator. Swapped for the hosted provider in deployment;
    // the in-memory one keeps local runs self-contained.
    let identity: Arc<dyn IdentityProvider> = Arc::new(MemoryIdentity::new());

    // Services
    let rules = CatalogRules {
        publish_timeout_seconds: config.business_rules.publish_timeout_seconds,
        listing_cache_seconds: config.business_rules.listing_cache_seconds,
    };
    let catalog = Arc::new(TripCatalog::new(
        trips.clone(),
        requests.clone(),
        profiles.clone(),
        cache,
        rules,
    ));
    let ledger = Arc::new(RequestLedger::new(
        requests.clone(),
        trips.clone(),
        profiles.clone(),
        reviews.clone(),
    ));
    let accounts = Arc::new(AccountService::new(profiles.clone()));
    let gate = Arc::new(SubscriptionGate::new(
        profiles.clone(),
        config.business_rules.subscription_period_days,
    ));
    let review_ledger = Arc::new(ReviewLedger::new(reviews, trips, requests, profiles));

    // Notification relay
    let (notify_tx, _) = tokio::sync::broadcast::channel(256);

    let app_state = AppState {
        identity,
        accounts,
        gate,
        catalog,
        ledger,
        reviews: review_ledger,
        limiter,
        notify_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rate_limit_per_minute: config.business_rules.rate_limit_per_minute,
    };

    let app = halador_api::app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
