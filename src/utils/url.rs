// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative href against the page it was found on.
///
/// Returns `None` for fragment-only, `javascript:`, `mailto:` and `tel:`
/// links and for anything that does not resolve to an http(s) URL. The
/// fragment of the resolved URL is dropped.
///
/// # Examples
/// ```
/// use bip_crawler::utils::url::resolve;
/// use url::Url;
///
/// let base = Url::parse("https://bip.example.pl/ogloszenia/").unwrap();
/// assert_eq!(
///     resolve(&base, "lista.html").unwrap().as_str(),
///     "https://bip.example.pl/ogloszenia/lista.html"
/// );
/// ```
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Lowercase host (with explicit port, if any) used as the throttling key.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

/// Whether two URLs point at the same host, ignoring a leading `www.`.
pub fn same_site(a: &Url, b: &Url) -> bool {
    fn bare(url: &Url) -> String {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
    }
    bare(a) == bare(b)
}

/// Join an environment-section path onto a source's base URL.
///
/// Absolute paths replace the base path; relative ones are appended to it
/// as a directory.
pub fn join_path(base: &Url, path: &str) -> Option<Url> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with('/') || path.contains("://") {
        return base.join(path).ok();
    }
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let with_slash = format!("{}/", dir.path());
        dir.set_path(&with_slash);
    }
    dir.join(path).ok()
}
