//! HTTP request building and sending
//!
//! Requests go out through the [`Transport`] trait so the pipeline can run
//! against something other than a live service.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::errors::{RestchainError, Result};

pub const USER_AGENT_STRING: &str = concat!("restchain/", env!("CARGO_PKG_VERSION"));

/// Everything needed to send one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    /// Headers in sending order
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of the first header called `name`, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends a request and returns the response body
///
/// Only failures to complete the exchange are errors. A response with any
/// status code is returned as-is.
pub trait Transport {
    fn send(&self, request: &RequestDescriptor) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &RequestDescriptor) -> Result<String> {
        (**self).send(request)
    }
}

/// Build the full request URL: base, endpoint, query parameters and the
/// `apikey` parameter. The query string is left out when there is nothing
/// to send.
pub fn build_request_url(
    base: &str,
    endpoint: &str,
    parameters: &[(String, String)],
    api_key: &str,
) -> Result<Url> {
    let joined = if base.is_empty() || base.ends_with('/') || endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    };
    let mut url = Url::parse(&joined)?;

    let api_key = api_key.trim();
    if !parameters.is_empty() || !api_key.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in parameters {
            pairs.append_pair(name, value);
        }
        if !api_key.is_empty() {
            pairs.append_pair("apikey", api_key);
        }
    }

    Ok(url)
}

/// [`Transport`] backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT_STRING);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<String> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| RestchainError::Config(format!("Invalid HTTP method '{}'", request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(build_headers(&request.headers));

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %redact_api_key(&request.url), "Sending request");
        let response = builder.send()?;
        let status = response.status();
        debug!(status = status.as_u16(), "Response received");
        // The status code does not change how the body is handled
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %redact_api_key(&request.url), "Request returned a non-success status");
        }

        Ok(response.text()?)
    }
}

fn build_headers(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid header"),
        }
    }
    headers
}

/// Hide the `apikey` query value for logging.
pub fn redact_api_key(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(k, _)| k == "apikey") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "apikey" { "[REDACTED]".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
