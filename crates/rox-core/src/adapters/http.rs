//! HTTP GET collaborator built on libcurl.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::retry::{Describe, FailureDescriptor, SystemCode, INVALID_REQUEST};

/// Error from a single fetch attempt (curl failure or HTTP error status).
/// Kept as-is through the retry loop so callers see the real cause.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The blocking transfer task was lost (panicked or runtime shut down).
    Aborted(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::Aborted(why) => write!(f, "transfer aborted: {}", why),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Http(_) | FetchError::Aborted(_) => None,
        }
    }
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::Curl(e)
    }
}

impl Describe for FetchError {
    fn describe(&self) -> FailureDescriptor {
        match self {
            FetchError::Curl(e) => describe_curl_error(e),
            FetchError::Http(code) => match u16::try_from(*code) {
                Ok(status) => FailureDescriptor::Http(status),
                Err(_) => FailureDescriptor::System(SystemCode::Other),
            },
            FetchError::Aborted(_) => FailureDescriptor::System(SystemCode::Other),
        }
    }
}

/// Map a curl error to a connection-level failure descriptor.
pub fn describe_curl_error(e: &curl::Error) -> FailureDescriptor {
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return FailureDescriptor::app(INVALID_REQUEST);
    }
    let code = if e.is_operation_timedout() {
        SystemCode::TimedOut
    } else if e.is_couldnt_connect() {
        SystemCode::ConnectionRefused
    } else if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        SystemCode::HostUnreachable
    } else if e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        SystemCode::ConnectionReset
    } else {
        SystemCode::Other
    };
    FailureDescriptor::System(code)
}

/// Performs one GET and returns the body.
///
/// Follows redirects. Runs in the current thread; use [`fetch_async`] from
/// async code.
pub fn fetch(url: &str, custom_headers: &HashMap<String, String>) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(10))?;
    easy.timeout(Duration::from_secs(30))?;

    if !custom_headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in custom_headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(body)
}

/// [`fetch`] on the blocking pool.
pub async fn fetch_async(
    url: String,
    headers: HashMap<String, String>,
) -> Result<Vec<u8>, FetchError> {
    tokio::task::spawn_blocking(move || fetch(&url, &headers))
        .await
        .map_err(|e| FetchError::Aborted(e.to_string()))?
}
