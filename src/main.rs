use std::sync::Arc;

use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_widget::aggregator::NewsAggregator;
use news_widget::clock::SystemClock;
use news_widget::config::Config;
use news_widget::db::Database;
use news_widget::fetcher::client_for;
use news_widget::presenter::WidgetPresenter;
use news_widget::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_widget=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("NEWS_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} feeds from {} ({:?} mode)",
        config.feeds.len(),
        config_path,
        config.mode
    );

    // Initialize cache storage
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:news_widget.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Cache storage initialized");

    let aggregator = NewsAggregator::new(
        config.feeds.clone(),
        client_for(&config)?,
        Arc::new(db),
        Arc::new(SystemClock),
        Arc::new(WidgetPresenter::new()),
    )
    .with_ttl(config.ttl()?)
    .with_max_items(config.max_items);

    let state = Arc::new(AppState {
        aggregator: Arc::new(aggregator),
    });

    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Start server
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
