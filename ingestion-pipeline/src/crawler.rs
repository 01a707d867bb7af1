//! The page-fetch capability consumed by the crawl orchestrator.
//!
//! Rendering happens in a headless browser so client-side-rendered
//! documentation still yields text; readability extraction then reduces the
//! DOM to markdown. The trait boundary keeps browser internals out of the
//! pipeline and lets tests substitute canned pages.

use std::{net::IpAddr, time::Instant};

use async_trait::async_trait;
use common::error::AppError;
use dom_smoothie::{Article, Readability, TextMode};
use headless_chrome::Browser;
use tracing::{info, warn};

#[async_trait]
pub trait PageCrawler: Send + Sync {
    /// Fetches a page and returns its rendered text as markdown.
    async fn fetch(&self, url: &str) -> Result<String, AppError>;
}

pub struct HeadlessChromeCrawler;

#[async_trait]
impl PageCrawler for HeadlessChromeCrawler {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let parsed_url =
            url::Url::parse(url).map_err(|_| AppError::Validation("Invalid URL".to_string()))?;
        ensure_crawl_url_allowed(&parsed_url)?;

        info!("Fetching URL: {}", url);
        let now = Instant::now();

        let browser = {
            #[cfg(feature = "docker")]
            {
                let options = headless_chrome::LaunchOptionsBuilder::default()
                    .sandbox(false)
                    .build()
                    .map_err(|e| AppError::Crawl(e.to_string()))?;
                Browser::new(options).map_err(crawl_error)?
            }
            #[cfg(not(feature = "docker"))]
            {
                Browser::default().map_err(crawl_error)?
            }
        };

        let tab = browser.new_tab().map_err(crawl_error)?;
        let page = tab.navigate_to(url).map_err(crawl_error)?;
        let loaded_page = page.wait_until_navigated().map_err(crawl_error)?;
        let raw_content = loaded_page.get_content().map_err(crawl_error)?;

        let config = dom_smoothie::Config {
            text_mode: TextMode::Markdown,
            ..Default::default()
        };
        let mut readability = Readability::new(raw_content, None, Some(config))
            .map_err(|e| AppError::Crawl(e.to_string()))?;
        let article: Article = readability
            .parse()
            .map_err(|e| AppError::Crawl(e.to_string()))?;

        info!("URL: {}. Total time: {:?}", url, now.elapsed());

        Ok(article.text_content.into())
    }
}

fn crawl_error(err: anyhow::Error) -> AppError {
    AppError::Crawl(err.to_string())
}

fn ensure_crawl_url_allowed(url: &url::Url) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(%url, %scheme, "Rejected crawl URL due to unsupported scheme");
            return Err(AppError::Validation(
                "Unsupported URL scheme for crawling".to_string(),
            ));
        }
    }

    let Some(host) = url.host_str() else {
        warn!(%url, "Rejected crawl URL missing host");
        return Err(AppError::Validation(
            "URL is missing a host component".to_string(),
        ));
    };

    if host.eq_ignore_ascii_case("localhost") {
        warn!(%url, host, "Rejected crawl URL to localhost");
        return Err(AppError::Validation(
            "Crawl URL host is not allowed".to_string(),
        ));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        let is_disallowed = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_unique_local() || v6.is_unicast_link_local(),
        };

        if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || is_disallowed {
            warn!(%url, host, %ip, "Rejected crawl URL pointing to restricted network range");
            return Err(AppError::Validation(
                "Crawl URL host is not allowed".to_string(),
            ));
        }
    }

    Ok(())
}
