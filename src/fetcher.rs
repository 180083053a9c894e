use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, FetchMode};
use crate::error::FetchError;
use crate::news::{parse_pub_date, FeedSource, RawItem};

const USER_AGENT: &str = "NewsWidget/1.0 (News Aggregator)";

/// Retrieves the raw items of one feed source.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_items(&self, source: &FeedSource) -> Result<Vec<RawItem>, FetchError>;
}

fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Builds the feed client selected by the configuration.
pub fn client_for(config: &Config) -> Result<Arc<dyn FeedClient>, FetchError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client: Arc<dyn FeedClient> = match config.mode {
        FetchMode::Conversion => Arc::new(ConversionClient::new(
            &config.service.endpoint,
            config.service.api_key.clone(),
            config.items_per_source,
            timeout,
        )?),
        FetchMode::Direct => Arc::new(DirectFeedClient::new(config.items_per_source, timeout)?),
    };
    Ok(client)
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Option<Vec<ServiceItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceItem {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    thumbnail: Option<String>,
    // Either an object with a `link` or an empty array, depending on the feed
    #[serde(default)]
    enclosure: serde_json::Value,
}

impl From<ServiceItem> for RawItem {
    fn from(item: ServiceItem) -> Self {
        let enclosure_link = item
            .enclosure
            .get("link")
            .and_then(|l| l.as_str())
            .map(str::to_string);

        RawItem {
            title: item.title,
            description: item.description,
            content: item.content,
            link: item.link,
            published: item.pub_date.as_deref().and_then(parse_pub_date),
            thumbnail: item.thumbnail,
            enclosure_link,
        }
    }
}

/// Client for the feed-to-JSON conversion service.
pub struct ConversionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    count: usize,
}

impl ConversionClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        count: usize,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.to_string(),
            api_key,
            count,
        })
    }

    fn parse_response(bytes: &[u8]) -> Result<Vec<RawItem>, FetchError> {
        let response: ServiceResponse = serde_json::from_slice(bytes)?;

        if response.status != "ok" {
            let detail = response.message.unwrap_or(response.status);
            return Err(FetchError::Service(detail));
        }

        Ok(response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(RawItem::from)
            .collect())
    }
}

#[async_trait]
impl FeedClient for ConversionClient {
    async fn fetch_items(&self, source: &FeedSource) -> Result<Vec<RawItem>, FetchError> {
        debug!("Requesting {} through conversion service", source.url);

        let count = self.count.to_string();
        let mut query = vec![("rss_url", source.url.as_str()), ("count", count.as_str())];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.as_str()));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        let items = Self::parse_response(&bytes)?;
        info!("Fetched {} items from '{}'", items.len(), source.name);
        Ok(items)
    }
}

/// Client that downloads and parses RSS/Atom feeds itself.
pub struct DirectFeedClient {
    client: Client,
    count: usize,
}

impl DirectFeedClient {
    pub fn new(count: usize, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            count,
        })
    }

    pub fn parse_feed(bytes: &[u8], count: usize) -> Result<Vec<RawItem>, FetchError> {
        let parsed = parser::parse(bytes)?;
        Ok(parsed
            .entries
            .into_iter()
            .take(count)
            .map(Self::entry_to_raw)
            .collect())
    }

    pub fn entry_to_raw(entry: feed_rs::model::Entry) -> RawItem {
        let thumbnail = entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .next();

        let enclosure_link = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .filter(|c| {
                c.content_type
                    .as_ref()
                    .map(|t| t.to_string().starts_with("image/"))
                    .unwrap_or(false)
            })
            .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
            .next();

        RawItem {
            title: entry.title.map(|t| t.content),
            description: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            link: entry.links.first().map(|l| l.href.clone()),
            published: entry.published.or(entry.updated),
            thumbnail,
            enclosure_link,
        }
    }
}

#[async_trait]
impl FeedClient for DirectFeedClient {
    async fn fetch_items(&self, source: &FeedSource) -> Result<Vec<RawItem>, FetchError> {
        debug!("Fetching feed: {} ({})", source.name, source.url);

        let response = self.client.get(&source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        let items = Self::parse_feed(&bytes, self.count)?;
        info!("Fetched {} items from '{}'", items.len(), source.name);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_source(url: &str) -> FeedSource {
        FeedSource::new("Test Source", url, "Research")
    }

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0">
            <channel>
                <title>Tech News</title>
                <link>https://technews.example.com</link>
                <description>Latest tech news</description>
                <item>
                    <title>Breaking: New Technology Announced</title>
                    <link>https://technews.example.com/article/1</link>
                    <description>&lt;p&gt;Big news&lt;/p&gt;</description>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 GMT</pubDate>
                </item>
                <item>
                    <title>Review: Latest Gadget</title>
                    <link>https://technews.example.com/article/2</link>
                    <pubDate>Mon, 09 Dec 2024 10:00:00 GMT</pubDate>
                </item>
                <item>
                    <title>Third</title>
                    <link>https://technews.example.com/article/3</link>
                </item>
            </channel>
        </rss>
    "#;

    mod parse_response_tests {
        use super::*;

        #[test]
        fn test_ok_response() {
            let body = r#"{
                "status": "ok",
                "items": [
                    {
                        "title": "Hello",
                        "description": "<p>World</p>",
                        "link": "https://example.com/1",
                        "pubDate": "2024-01-15 10:30:00",
                        "thumbnail": "https://example.com/thumb.jpg",
                        "enclosure": {}
                    },
                    {
                        "title": "Second",
                        "content": "Body",
                        "link": "https://example.com/2",
                        "pubDate": "not a date",
                        "thumbnail": "",
                        "enclosure": { "link": "https://example.com/enc.jpg" }
                    }
                ]
            }"#;

            let items = ConversionClient::parse_response(body.as_bytes()).unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].title.as_deref(), Some("Hello"));
            assert_eq!(
                items[0].published,
                Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
            );
            assert_eq!(items[0].enclosure_link, None);
            assert_eq!(items[1].published, None);
            assert_eq!(
                items[1].enclosure_link.as_deref(),
                Some("https://example.com/enc.jpg")
            );
        }

        #[test]
        fn test_enclosure_as_empty_array() {
            let body = r#"{"status":"ok","items":[{"link":"https://example.com/1","enclosure":[]}]}"#;
            let items = ConversionClient::parse_response(body.as_bytes()).unwrap();
            assert_eq!(items[0].enclosure_link, None);
        }

        #[test]
        fn test_error_status() {
            let body = r#"{"status":"error","message":"rss_url parameter is required."}"#;
            let result = ConversionClient::parse_response(body.as_bytes());
            assert!(matches!(result, Err(FetchError::Service(m)) if m.contains("rss_url")));
        }

        #[test]
        fn test_ok_without_items() {
            let body = r#"{"status":"ok"}"#;
            let items = ConversionClient::parse_response(body.as_bytes()).unwrap();
            assert!(items.is_empty());
        }

        #[test]
        fn test_malformed_json() {
            let result = ConversionClient::parse_response(b"<html>rate limited</html>");
            assert!(matches!(result, Err(FetchError::Decode(_))));
        }
    }

    mod conversion_client_tests {
        use super::*;

        #[tokio::test]
        async fn test_sends_feed_url_and_count() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/api.json"))
                .and(query_param("rss_url", "https://feeds.example.com/rss"))
                .and(query_param("count", "5"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"status":"ok","items":[{"title":"A","link":"https://example.com/a"}]}"#,
                ))
                .expect(1)
                .mount(&server)
                .await;

            let client = ConversionClient::new(
                &format!("{}/v1/api.json", server.uri()),
                None,
                5,
                Duration::from_secs(5),
            )
            .unwrap();

            let items = client
                .fetch_items(&test_source("https://feeds.example.com/rss"))
                .await
                .unwrap();
            assert_eq!(items.len(), 1);
        }

        #[tokio::test]
        async fn test_sends_api_key_when_configured() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("api_key", "secret"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(r#"{"status":"ok","items":[]}"#),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = ConversionClient::new(
                &server.uri(),
                Some("secret".to_string()),
                5,
                Duration::from_secs(5),
            )
            .unwrap();

            let items = client
                .fetch_items(&test_source("https://feeds.example.com/rss"))
                .await
                .unwrap();
            assert!(items.is_empty());
        }

        #[tokio::test]
        async fn test_http_error_status() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(429))
                .mount(&server)
                .await;

            let client =
                ConversionClient::new(&server.uri(), None, 5, Duration::from_secs(5)).unwrap();

            let result = client
                .fetch_items(&test_source("https://feeds.example.com/rss"))
                .await;
            assert!(matches!(
                result,
                Err(FetchError::Status(s)) if s == reqwest::StatusCode::TOO_MANY_REQUESTS
            ));
        }

        #[tokio::test]
        async fn test_timeout() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(r#"{"status":"ok","items":[]}"#)
                        .set_delay(Duration::from_secs(2)),
                )
                .mount(&server)
                .await;

            let client =
                ConversionClient::new(&server.uri(), None, 5, Duration::from_millis(200)).unwrap();

            let result = client
                .fetch_items(&test_source("https://feeds.example.com/rss"))
                .await;
            assert!(matches!(result, Err(FetchError::Http(_))));
        }
    }

    mod client_for_tests {
        use super::*;

        #[tokio::test]
        async fn test_direct_mode_fetches_feed_itself() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_RSS))
                .expect(1)
                .mount(&server)
                .await;

            let config = Config::from_str(
                r#"
                mode = "direct"
                items_per_source = 1
                feeds = []
                "#,
            )
            .unwrap();

            let client = client_for(&config).unwrap();
            let items = client
                .fetch_items(&test_source(&format!("{}/rss", server.uri())))
                .await
                .unwrap();
            assert_eq!(items.len(), 1);
        }

        #[tokio::test]
        async fn test_conversion_mode_uses_endpoint() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api.json"))
                .and(query_param("count", "3"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(r#"{"status":"ok","items":[]}"#),
                )
                .expect(1)
                .mount(&server)
                .await;

            let config = Config::from_str(&format!(
                r#"
                items_per_source = 3
                feeds = []

                [service]
                endpoint = "{}/api.json"
                "#,
                server.uri()
            ))
            .unwrap();

            let client = client_for(&config).unwrap();
            let items = client
                .fetch_items(&test_source("https://feeds.example.com/rss"))
                .await
                .unwrap();
            assert!(items.is_empty());
        }
    }

    mod direct_feed_tests {
        use super::*;

        #[test]
        fn test_parse_feed_maps_entries() {
            let items = DirectFeedClient::parse_feed(SAMPLE_RSS.as_bytes(), 5).unwrap();

            assert_eq!(items.len(), 3);
            assert_eq!(
                items[0].title.as_deref(),
                Some("Breaking: New Technology Announced")
            );
            assert_eq!(
                items[0].link.as_deref(),
                Some("https://technews.example.com/article/1")
            );
            assert_eq!(
                items[0].published,
                Some(Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap())
            );
            assert!(items[0]
                .description
                .as_deref()
                .unwrap_or_default()
                .contains("Big news"));
        }

        #[test]
        fn test_parse_feed_respects_count() {
            let items = DirectFeedClient::parse_feed(SAMPLE_RSS.as_bytes(), 2).unwrap();
            assert_eq!(items.len(), 2);
        }

        #[test]
        fn test_parse_feed_picks_image_media() {
            let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Media Feed</title>
    <link>https://media.example.com</link>
    <item>
      <title>With picture</title>
      <link>https://media.example.com/1</link>
      <media:content url="https://media.example.com/clip.mp4" type="video/mp4"/>
      <media:content url="https://media.example.com/photo.jpg" type="image/jpeg"/>
    </item>
  </channel>
</rss>"#;

            let items = DirectFeedClient::parse_feed(feed.as_bytes(), 5).unwrap();

            assert_eq!(items.len(), 1);
            assert_eq!(
                items[0].enclosure_link.as_deref(),
                Some("https://media.example.com/photo.jpg")
            );
        }

        #[test]
        fn test_parse_invalid_feed() {
            let result = DirectFeedClient::parse_feed(b"this is not a feed", 5);
            assert!(matches!(result, Err(FetchError::Parse(_))));
        }

        #[tokio::test]
        async fn test_fetch_items_from_server() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_RSS))
                .mount(&server)
                .await;

            let client = DirectFeedClient::new(5, Duration::from_secs(5)).unwrap();
            let items = client
                .fetch_items(&test_source(&format!("{}/rss", server.uri())))
                .await
                .unwrap();
            assert_eq!(items.len(), 3);
        }

        #[tokio::test]
        async fn test_fetch_items_not_found() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let client = DirectFeedClient::new(5, Duration::from_secs(5)).unwrap();
            let result = client
                .fetch_items(&test_source(&format!("{}/rss", server.uri())))
                .await;
            assert!(matches!(result, Err(FetchError::Status(_))));
        }
    }
}
