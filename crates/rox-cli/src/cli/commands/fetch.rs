//! `rox fetch <url> [-o FILE] [-H "Name: value"]...`

use anyhow::{bail, Context, Result};
use rox_core::adapters::fs;
use rox_core::adapters::http::fetch_async;
use rox_core::breaker::TargetKey;
use rox_core::executor::Executor;
use rox_core::retry::RetryPolicy;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Split a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header must look like \"Name: value\": {raw}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header name is empty: {raw}");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub async fn run_fetch(
    executor: &Executor,
    policy: &RetryPolicy,
    url: &str,
    output: Option<&Path>,
    raw_headers: &[String],
) -> Result<()> {
    let headers = raw_headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<HashMap<_, _>>>()?;
    let target = TargetKey::for_url(url)?;

    let body = executor
        .run(&target, policy, || fetch_async(url.to_string(), headers.clone()))
        .await
        .with_context(|| format!("fetch {url}"))?;

    match output {
        Some(path) => {
            fs::write_file(path, &body)
                .with_context(|| format!("write {}", path.display()))?;
            println!("{} bytes  {} -> {}", body.len(), url, path.display());
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&body)?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_header;

    #[test]
    fn header_split_on_first_colon() {
        let (name, value) = parse_header("Authorization: Bearer a:b").unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer a:b");
    }

    #[test]
    fn header_without_colon_or_name_rejected() {
        assert!(parse_header("Accept").is_err());
        assert!(parse_header(" : x").is_err());
    }
}
