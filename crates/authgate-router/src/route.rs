//! Route values

use serde::Serialize;
use std::collections::BTreeMap;

/// A navigation target: path plus decoded query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteParams {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl RouteParams {
    /// Parses `/path?key=value#fragment`. The fragment is dropped. The path
    /// is percent-decoded and normalized (`.`, `..` and empty segments
    /// resolved), so prefix checks see the page that will actually render.
    pub fn parse(url: &str) -> Self {
        let without_fragment = url.split('#').next().unwrap_or_default();
        let (path, query) = match without_fragment.split_once('?') {
            Some((p, q)) => (p, q),
            None => (without_fragment, ""),
        };

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (decode_component(k), decode_component(v)),
                None => (decode_component(pair), String::new()),
            })
            .collect();

        Self {
            path: normalize_path(path),
            query,
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Path with the query re-encoded, suitable for a `Location` header.
    pub fn full_path(&self) -> String {
        let path: Vec<String> = self
            .path
            .split('/')
            .map(|segment| urlencoding::encode(&segment.replace("%2F", "/")).into_owned())
            .collect();
        let path = path.join("/");
        if self.query.is_empty() {
            return path;
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", path, query.join("&"))
    }
}

fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for raw_segment in raw.split('/') {
        // An encoded slash stays inside its segment.
        let segment = match urlencoding::decode(raw_segment) {
            Ok(decoded) => decoded.replace('/', "%2F"),
            Err(_) => raw_segment.to_string(),
        };
        match segment.as_str() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Where the user currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub path: String,
    pub full_path: String,
}

impl RouteInfo {
    pub fn parse(url: &str) -> Self {
        Self::from(&RouteParams::parse(url))
    }
}

impl From<&RouteParams> for RouteInfo {
    fn from(params: &RouteParams) -> Self {
        Self {
            path: params.path.clone(),
            full_path: params.full_path(),
        }
    }
}

/// Accepts a post-login destination only when it stays on this site: a
/// relative path starting with a single `/`.
pub fn safe_return_url(candidate: Option<&str>) -> Option<&str> {
    let url = candidate?.trim();
    let on_site = url.starts_with('/') && !url.starts_with("//") && !url.contains('\\');
    on_site.then_some(url)
}
