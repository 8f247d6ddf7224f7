use crate::UrlError;
use url::Url;

/// Query parameters that never change which page is served
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "mc_eid",
];

/// Reduces a candidate URL to the key used for per-run uniqueness
///
/// Two search hits with the same key are the same site page:
///
/// 1. Parse the URL; reject anything that is not HTTP(S)
/// 2. Drop the scheme (http and https hits collapse)
/// 3. Lowercase the host and strip a leading `www.`
/// 4. Drop dot segments, repeated and trailing slashes
/// 5. Drop the fragment and tracking parameters, sort the rest
///
/// # Examples
///
/// ```
/// use sitescout::url::dedupe_key;
///
/// let key = dedupe_key("http://WWW.Example.com/services/?utm_source=ad#top").unwrap();
/// assert_eq!(key, "example.com/services");
/// ```
pub fn dedupe_key(url_str: &str) -> Result<String, UrlError> {
    let url = parse_http_url(url_str)?;
    let host = site_host(&url)?;
    let path = normalize_path(url.path());

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    let mut key = match url.port() {
        Some(port) => format!("{}:{}{}", host, port, path),
        None => format!("{}{}", host, path),
    };
    if path == "/" {
        key.pop();
    }

    if !params.is_empty() {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }

    Ok(key)
}

/// Returns the site's host, lowercased and without `www.`
///
/// # Examples
///
/// ```
/// use sitescout::url::site_domain;
///
/// assert_eq!(site_domain("https://www.Plumbing.com.au/contact").unwrap(), "plumbing.com.au");
/// ```
pub fn site_domain(url_str: &str) -> Result<String, UrlError> {
    let url = parse_http_url(url_str)?;
    site_host(&url)
}

fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            other
        ))),
    }
}

fn site_host(url: &Url) -> Result<String, UrlError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();

    Ok(match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    })
}

/// Removes dot segments, empty segments and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}
