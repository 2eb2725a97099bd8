use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// Downloads the raw markdown behind a documentation link.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// `None` for any failure or non-200 response.
    async fn fetch_markdown(&self, link: &str) -> Option<String>;
}

/// The docs site serves every page's source at `<page>.md`.
pub fn markdown_url(link: &str) -> String {
    format!("{}.md", link.trim_end_matches('/'))
}

#[derive(Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_markdown(&self, link: &str) -> Option<String> {
        let url = markdown_url(link);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(url = %url, error = %error, "doc page fetch failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            debug!(url = %url, status = %response.status(), "doc page fetch returned non-200");
            return None;
        }

        response.text().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{markdown_url, HttpPageFetcher, PageFetcher};

    #[test]
    fn markdown_url_strips_trailing_slash() {
        assert_eq!(
            markdown_url("https://ngrok.com/docs/traffic-policy/"),
            "https://ngrok.com/docs/traffic-policy.md"
        );
        assert_eq!(markdown_url("https://ngrok.com/docs/oauth"), "https://ngrok.com/docs/oauth.md");
    }

    #[tokio::test]
    async fn only_successful_pages_are_returned() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/docs/oauth.md")
            .with_status(200)
            .with_body("# OAuth\n```yaml\non_http_request: []\n```")
            .create_async()
            .await;
        let missing = server.mock("GET", "/docs/missing.md").with_status(404).create_async().await;

        let fetcher = HttpPageFetcher::new(Duration::from_secs(5)).expect("client should build");

        let page = fetcher.fetch_markdown(&format!("{}/docs/oauth/", server.url())).await;
        assert!(page.is_some_and(|body| body.starts_with("# OAuth")));
        assert!(fetcher.fetch_markdown(&format!("{}/docs/missing", server.url())).await.is_none());

        ok.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn redirects_are_followed() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/docs/new.md", server.url());
        server
            .mock("GET", "/docs/old.md")
            .with_status(301)
            .with_header("location", &target)
            .create_async()
            .await;
        server.mock("GET", "/docs/new.md").with_status(200).with_body("moved").create_async().await;

        let fetcher = HttpPageFetcher::new(Duration::from_secs(5)).expect("client should build");

        let page = fetcher.fetch_markdown(&format!("{}/docs/old", server.url())).await;
        assert_eq!(page.as_deref(), Some("moved"));
    }
}
