use url::Url;

/// Resolves an image reference found on `base` into an absolute URL.
///
/// Purely syntactic: nothing is fetched. When `base` itself cannot be parsed
/// the candidate is returned as-is.
pub fn normalize(candidate: &str, base: &str) -> String {
    let candidate = candidate.trim();

    if candidate.starts_with("http") {
        return candidate.to_owned();
    }

    if let Some(rest) = candidate.strip_prefix("//") {
        return format!("https://{rest}");
    }

    let Ok(base_url) = Url::parse(base) else {
        return candidate.to_owned();
    };

    if candidate.starts_with('/') {
        return format!("{}{candidate}", origin_prefix(&base_url));
    }

    match base_url.join(candidate) {
        Ok(joined) => joined.to_string(),
        Err(err) => {
            tracing::debug!(candidate, base, ?err, "relative url join failed");
            candidate.to_owned()
        }
    }
}

fn origin_prefix(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    }
}
