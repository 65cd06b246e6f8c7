use std::time::Duration;

use async_trait::async_trait;
use spider::ClientBuilder;
use spider::page::Page;

use super::error::FetchError;

/// Anything that can turn a URL into an HTML body.
#[async_trait]
pub trait HtmlSource: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

fn check_status(url: &str, status: u16) -> Result<(), FetchError> {
    if (200..=299).contains(&status) {
        Ok(())
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status,
        })
    }
}

fn non_empty(url: &str, html: String) -> Result<String, FetchError> {
    if html.trim().is_empty() {
        Err(FetchError::EmptyBody {
            url: url.to_string(),
        })
    } else {
        Ok(html)
    }
}

/// Encyclopedia pages go through spider's page fetcher.
pub struct SpiderSource {
    client: spider::Client,
}

impl SpiderSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlSource for SpiderSource {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let page = Page::new(url, &self.client).await;
        check_status(url, page.status_code.as_u16())?;
        non_empty(url, page.get_html())
    }
}

/// Plain reqwest client used for the rating site.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlSource for HttpSource {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http_err)?;
        check_status(url, response.status().as_u16())?;
        let body = response.text().await.map_err(http_err)?;
        non_empty(url, body)
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory source: each URL maps to a queue of bodies, the last one repeats.
    #[derive(Default)]
    pub struct StubSource {
        pages: Mutex<HashMap<String, Vec<String>>>,
        requests: Mutex<Vec<String>>,
    }

    impl StubSource {
        pub fn with_page(self, url: &str, html: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(html.to_string());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl HtmlSource for StubSource {
        async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            let mut pages = self.pages.lock().unwrap();
            let Some(queue) = pages.get_mut(url) else {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            };
            let body = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            };
            non_empty(url, body)
        }
    }

    #[tokio::test]
    async fn stub_replays_queued_bodies() {
        let stub = StubSource::default()
            .with_page("http://a", "<p>one</p>")
            .with_page("http://a", "<p>two</p>");
        assert_eq!(stub.fetch_html("http://a").await.unwrap(), "<p>one</p>");
        assert_eq!(stub.fetch_html("http://a").await.unwrap(), "<p>two</p>");
        assert_eq!(stub.fetch_html("http://a").await.unwrap(), "<p>two</p>");
        assert!(matches!(
            stub.fetch_html("http://b").await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(stub.request_count("http://a"), 3);
    }
}
