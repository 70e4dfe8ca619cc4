pub mod chat;
pub mod embedding;
pub mod rerank;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client, RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Bearer authentication plus configured default headers.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	insert_default_headers(&mut headers, default_headers)?;

	Ok(headers)
}

/// Anthropic authenticates with `x-api-key` and pins the API version.
pub fn anthropic_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(HeaderName::from_static("x-api-key"), api_key.parse()?);
	headers.insert(
		HeaderName::from_static("anthropic-version"),
		HeaderValue::from_static(ANTHROPIC_VERSION),
	);
	insert_default_headers(&mut headers, default_headers)?;

	Ok(headers)
}

fn insert_default_headers(headers: &mut HeaderMap, default_headers: &Map<String, Value>) -> Result<()> {
	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(())
}

fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Sends the request and decodes a JSON body, keeping the error body of failed calls.
async fn send_json(request: RequestBuilder) -> Result<Value> {
	let res = request.send().await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status {
			status: status.as_u16(),
			body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
		});
	}

	Ok(res.json().await?)
}
