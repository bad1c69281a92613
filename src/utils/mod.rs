use anyhow::{bail, Result};

/// Cookie attributes that show up when a `Set-Cookie` line is pasted.
const COOKIE_ATTRIBUTES: &[&str] = &[
    "path", "domain", "expires", "max-age", "secure", "httponly", "samesite", "priority",
];

/// Turn pasted cookies (or `Set-Cookie` content) into a `Cookie` header value.
/// "a=1; Path=/; b = 2; HttpOnly" → "a=1; b=2"
pub fn sanitize_cookie_header(raw: &str) -> String {
    raw.split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !COOKIE_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str()))
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse repeated `Name: value` arguments.
pub fn parse_headers<S: AsRef<str>>(pairs: &[S]) -> Result<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for raw in pairs {
        let raw = raw.as_ref();
        let Some((name, value)) = raw.split_once(':') else {
            bail!("expected 'Name: value', got: {}", raw);
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            bail!("empty header name in: {}", raw);
        }
        // later duplicates replace earlier ones
        headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
    }
    Ok(headers)
}

/// Split `key=value` at the first `=`.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => bail!("expected key=value, got: {}", raw),
    }
}

/// Split a comma-separated URL list, dropping blanks.
pub fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}
