use crate::browser::render_page;
use crate::config::{FetchConfig, FetchMode, LoadedSource, resolve_path};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub source_url: String,
    pub body: Vec<u8>,
    pub rendered: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: StatusCode },
    #[error("browser render of {url} failed: {reason}")]
    Render { url: String, reason: String },
}

pub fn fetch_source_documents(source: &LoadedSource) -> Result<Vec<FetchedDocument>> {
    let doc = match source.config.fetch.mode {
        FetchMode::Http => fetch_http_document(source)?,
        FetchMode::File => fetch_file_document(source)?,
        FetchMode::Inline => fetch_inline_document(source)?,
    };
    Ok(vec![doc])
}

fn fetch_http_document(source: &LoadedSource) -> Result<FetchedDocument> {
    let fetch = &source.config.fetch;
    let url = fetch.url.as_deref().context("fetch.url missing")?;
    let browser = &fetch.browser;
    let user_agent = fetch.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);

    if browser.enabled && browser.always {
        let body = render_page(browser, url, user_agent)?;
        info!(source = %source.config.source.key, url, bytes = body.len(), "rendered page");
        return Ok(FetchedDocument {
            source_url: url.to_string(),
            body: body.into_bytes(),
            rendered: true,
        });
    }

    let client = build_client(fetch)?;
    match fetch_page(&client, fetch, url) {
        Ok(body) => {
            info!(source = %source.config.source.key, url, bytes = body.len(), "fetched page");
            Ok(FetchedDocument {
                source_url: url.to_string(),
                body,
                rendered: false,
            })
        }
        Err(err) if browser.enabled => {
            warn!(
                source = %source.config.source.key,
                url,
                error = %err,
                "plain fetch failed; falling back to browser render"
            );
            let body = render_page(browser, url, user_agent)
                .with_context(|| format!("plain fetch failed first: {err}"))?;
            info!(source = %source.config.source.key, url, bytes = body.len(), "rendered page");
            Ok(FetchedDocument {
                source_url: url.to_string(),
                body: body.into_bytes(),
                rendered: true,
            })
        }
        Err(err) => Err(err.into()),
    }
}

pub fn browser_headers(fetch: &FetchConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(fetch.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .context("invalid user agent")?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers.insert(
        REFERER,
        HeaderValue::from_str(&fetch.referer).context("invalid referer")?,
    );
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    for (k, v) in &fetch.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn build_client(fetch: &FetchConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .default_headers(browser_headers(fetch)?)
        .cookie_store(true)
        .build()
        .context("failed to build reqwest client")
}

fn fetch_page(client: &Client, fetch: &FetchConfig, url: &str) -> Result<Vec<u8>, FetchError> {
    if let Some(warmup) = fetch.warmup_url.as_deref() {
        match get_bytes(client, warmup) {
            Ok(bytes) => debug!(url = warmup, bytes = bytes.len(), "session warm-up done"),
            Err(err) => debug!(url = warmup, error = %err, "session warm-up failed; continuing"),
        }
    }

    get_bytes(client, url)
}

fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    let resp = client.get(url).send().map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(resp.bytes().map_err(transport)?.to_vec())
}

fn fetch_file_document(source: &LoadedSource) -> Result<FetchedDocument> {
    let file_path = source
        .config
        .fetch
        .file_path
        .as_ref()
        .context("fetch.file_path missing for file mode")?;
    let resolved = resolve_path(&source.path, file_path)?;
    let bytes = std::fs::read(&resolved)
        .with_context(|| format!("failed to read file source {}", resolved.display()))?;

    info!(
        source = %source.config.source.key,
        file = %resolved.display(),
        bytes = bytes.len(),
        "loaded file source"
    );

    Ok(FetchedDocument {
        source_url: source
            .config
            .listing_url()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("file://{}", resolved.display())),
        body: bytes,
        rendered: false,
    })
}

fn fetch_inline_document(source: &LoadedSource) -> Result<FetchedDocument> {
    let inline = source
        .config
        .fetch
        .inline_data
        .as_ref()
        .context("fetch.inline_data missing for inline mode")?;

    debug!(
        source = %source.config.source.key,
        bytes = inline.len(),
        "loaded inline source"
    );

    Ok(FetchedDocument {
        source_url: source
            .config
            .listing_url()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("inline://{}", source.config.source.key)),
        body: inline.as_bytes().to_vec(),
        rendered: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_source_config;
    use std::path::PathBuf;

    fn loaded(text: &str, path: PathBuf) -> LoadedSource {
        LoadedSource {
            path,
            config: parse_source_config(text).expect("config parses"),
        }
    }

    #[test]
    fn header_set_mimics_a_browser() {
        let mut fetch = FetchConfig::default();
        fetch
            .headers
            .insert("Accept-Language".to_string(), "en-GB".to_string());
        let headers = browser_headers(&fetch).expect("headers");

        assert_eq!(headers[USER_AGENT], DEFAULT_USER_AGENT);
        assert!(headers[ACCEPT].to_str().is_ok_and(|v| v.starts_with("text/html")));
        assert_eq!(headers[REFERER], "https://www.google.com/");
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-GB");
    }

    #[test]
    fn inline_document_uses_listing_url() {
        let source = loaded(
            r#"
            [source]
            key = "inline"
            name = "Inline"
            [fetch]
            mode = "inline"
            inline_data = "<html></html>"
            listing_url = "https://example.com/events"
            [locate]
            selectors = ["article"]
            [extract]
            title_selectors = ["h2"]
            "#,
            PathBuf::from("sources/inline.toml"),
        );
        let docs = fetch_source_documents(&source).expect("inline fetch");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_url, "https://example.com/events");
        assert_eq!(docs[0].body, b"<html></html>");
        assert!(!docs[0].rendered);
    }

    #[test]
    fn file_document_resolves_relative_to_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("page.html"), "<p>hi</p>")?;
        let source = loaded(
            r#"
            [source]
            key = "file"
            name = "File"
            [fetch]
            mode = "file"
            file_path = "page.html"
            [locate]
            selectors = ["p"]
            [extract]
            title_selectors = ["h2"]
            "#,
            dir.path().join("file.toml"),
        );
        let docs = fetch_source_documents(&source)?;
        assert_eq!(docs[0].body, b"<p>hi</p>");
        assert!(docs[0].source_url.starts_with("file://"));
        Ok(())
    }

    fn unreachable_source(browser: &str) -> LoadedSource {
        loaded(
            &format!(
                r#"
                [source]
                key = "unreachable"
                name = "Unreachable"
                [fetch]
                url = "http://127.0.0.1:1/events"
                timeout_secs = 5
                [fetch.browser]
                {browser}
                [locate]
                selectors = ["article"]
                [extract]
                title_selectors = ["h2"]
                "#
            ),
            PathBuf::from("sources/unreachable.toml"),
        )
    }

    #[cfg(unix)]
    #[test]
    fn failed_plain_fetch_falls_back_to_browser_once() {
        let source = unreachable_source("enabled = true\ncommand = \"echo\"");
        let docs = fetch_source_documents(&source).expect("browser fallback");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].rendered);
        assert_eq!(docs[0].source_url, "http://127.0.0.1:1/events");
        let body = String::from_utf8_lossy(&docs[0].body);
        assert!(body.contains("--dump-dom"));
        assert!(body.trim_end().ends_with("http://127.0.0.1:1/events"));
    }

    #[cfg(unix)]
    #[test]
    fn always_render_skips_plain_fetch() {
        let source = unreachable_source("enabled = true\nalways = true\ncommand = \"echo\"");
        let docs = fetch_source_documents(&source).expect("browser render");
        assert!(docs[0].rendered);
    }

    #[test]
    fn failed_plain_fetch_without_browser_is_an_error() {
        let source = unreachable_source("enabled = false\ncommand = \"echo\"");
        let err = fetch_source_documents(&source).expect_err("must fail");
        assert!(err.downcast_ref::<FetchError>().is_some());
    }

    #[test]
    fn failed_fallback_reports_render_error() {
        let source = unreachable_source("enabled = true\ncommand = \"definitely-not-a-browser-binary\"");
        let err = fetch_source_documents(&source).expect_err("must fail");
        assert!(format!("{err:#}").contains("plain fetch failed first"));
    }
}
