use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::EdnaError;

pub const MAX_ATTEMPTS: usize = 5;
const BASE_DELAY_MS: u64 = 500;

pub fn build_client(
    timeout_secs: Option<u64>,
    map_err: fn(String) -> EdnaError,
) -> Result<Client, EdnaError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("edna-results/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| map_err(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout_secs.map(Duration::from_secs))
        .build()
        .map_err(|err| map_err(err.to_string()))
}

pub fn send_with_retries<F>(
    mut make_req: F,
    map_err: fn(String) -> EdnaError,
) -> Result<Response, EdnaError>
where
    F: FnMut() -> RequestBuilder,
{
    retry(
        || make_req().send(),
        |outcome| match outcome {
            Ok(resp) => is_retryable_status(resp.status().as_u16()),
            Err(err) => is_retryable_error(err),
        },
        thread::sleep,
    )
    .map_err(|err| map_err(err.to_string()))
}

/// Runs `attempt` until it yields an outcome `is_retryable` rejects or
/// [`MAX_ATTEMPTS`] is reached, pausing `backoff(n)` after the n-th try.
/// The last outcome is returned as is.
pub fn retry<T, E>(
    mut attempt: impl FnMut() -> Result<T, E>,
    is_retryable: impl Fn(&Result<T, E>) -> bool,
    mut pause: impl FnMut(Duration),
) -> Result<T, E> {
    let mut tries = 1usize;
    loop {
        let outcome = attempt();
        if tries >= MAX_ATTEMPTS || !is_retryable(&outcome) {
            return outcome;
        }
        tracing::debug!(attempt = tries, "retrying request");
        pause(backoff(tries));
        tries += 1;
    }
}

pub fn handle_status(
    response: Response,
    map_status: fn(u16, String) -> EdnaError,
) -> Result<Response, EdnaError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "request failed".to_string());
    Err(map_status(status, message))
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(BASE_DELAY_MS << (attempt - 1))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
