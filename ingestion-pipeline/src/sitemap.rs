//! Resolves a documentation site's `sitemap.xml` into crawl candidates.

use common::error::AppError;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

/// Fetches `{root}/sitemap.xml` and extracts every `<loc>` value in
/// document order, duplicates preserved.
///
/// Any failure (network, non-2xx status, malformed XML) surfaces as
/// [`AppError::Resolution`]; the caller logs it and treats the site as
/// having nothing to crawl. No retries at this layer.
pub async fn resolve_sitemap(
    http: &reqwest::Client,
    root_url: &str,
) -> Result<Vec<String>, AppError> {
    let sitemap_url = format!("{}/sitemap.xml", root_url.trim_end_matches('/'));
    debug!(%sitemap_url, "fetching sitemap");

    let response = http
        .get(&sitemap_url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| AppError::Resolution(format!("fetching {sitemap_url}: {err}")))?;

    let body = response
        .text()
        .await
        .map_err(|err| AppError::Resolution(format!("reading {sitemap_url}: {err}")))?;

    parse_sitemap(&body)
}

/// Pure parsing half of the resolver, split out for testability.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) if element.local_name().as_ref() == b"loc" => {
                in_loc = true;
            }
            Ok(Event::End(element)) if element.local_name().as_ref() == b"loc" => {
                in_loc = false;
            }
            Ok(Event::Text(text)) if in_loc => {
                let value = text
                    .unescape()
                    .map_err(|err| AppError::Resolution(format!("malformed sitemap XML: {err}")))?;
                urls.push(value.into_owned());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(AppError::Resolution(format!("malformed sitemap XML: {err}")));
            }
        }
    }

    Ok(urls)
}
