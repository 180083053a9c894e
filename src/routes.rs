use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};

use crate::aggregator::NewsAggregator;
use crate::news::NewsItem;
use crate::presenter::WidgetView;

/// Number of placeholder cards shown while loading.
const SKELETON_CARDS: usize = 3;

pub struct AppState {
    pub aggregator: Arc<NewsAggregator>,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub section: NewsSectionTemplate,
}

#[derive(Template)]
#[template(path = "news_section.html")]
pub struct NewsSectionTemplate {
    pub visible: bool,
    pub skeletons: Vec<usize>,
    pub cards: Vec<NewsCard>,
    pub refreshing: bool,
}

#[derive(Template)]
#[template(path = "refresh_button.html")]
pub struct RefreshButtonTemplate {
    pub refreshing: bool,
}

/// A news item prepared for display.
pub struct NewsCard {
    pub title: String,
    pub description: String,
    pub link: String,
    pub thumbnail: String,
    pub fallback_image: String,
    pub category: String,
    pub source_name: String,
    pub time_ago: String,
}

impl NewsCard {
    pub fn new(item: &NewsItem, now: DateTime<Utc>) -> Self {
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            link: item.link.clone(),
            thumbnail: item.thumbnail.clone(),
            fallback_image: item.fallback_image().to_string(),
            category: item.category.clone(),
            source_name: item.source_name.clone(),
            time_ago: item.time_ago(now),
        }
    }
}

impl NewsSectionTemplate {
    pub fn from_view(view: WidgetView, now: DateTime<Utc>, refreshing: bool) -> Self {
        match view {
            WidgetView::Loading => Self {
                visible: true,
                skeletons: (0..SKELETON_CARDS).collect(),
                cards: Vec::new(),
                refreshing,
            },
            WidgetView::Items(items) => Self {
                visible: true,
                skeletons: Vec::new(),
                cards: items.iter().map(|item| NewsCard::new(item, now)).collect(),
                refreshing,
            },
            WidgetView::Hidden => Self {
                visible: false,
                skeletons: Vec::new(),
                cards: Vec::new(),
                refreshing,
            },
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Renders the items this request delivered, not whatever the shared
/// presenter holds by now.
fn section_for(state: &AppState, items: Vec<NewsItem>) -> NewsSectionTemplate {
    let view = if items.is_empty() {
        WidgetView::Hidden
    } else {
        WidgetView::Items(items)
    };
    NewsSectionTemplate::from_view(
        view,
        state.aggregator.clock().now(),
        state.aggregator.is_refreshing(),
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/news", get(news))
        .route("/news/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/health", get(health))
        .with_state(state)
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.aggregator.load_news().await;
    HtmlTemplate(IndexTemplate {
        section: section_for(&state, items),
    })
}

pub async fn news(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.aggregator.load_news().await;
    HtmlTemplate(section_for(&state, items))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.aggregator.refresh_news().await;
    HtmlTemplate(section_for(&state, items))
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let refreshing = state.aggregator.is_refreshing();
    HtmlTemplate(RefreshButtonTemplate { refreshing })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
