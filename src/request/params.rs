//! Query string and header helpers for request editors
//!
//! URLs handled here are often still templated (`{{base}}/users`), so every
//! helper falls back to plain string handling when the URL does not parse.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::HeaderMap;

/// An editable key/value row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl KeyValuePair {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            enabled: true,
        }
    }

    fn blank() -> Self {
        Self::new("", "")
    }

    fn is_usable(&self) -> bool {
        self.enabled && !self.key.trim().is_empty()
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Query parameters of `url`; a single blank row when there are none
pub fn parse_url_params(url: &str) -> Vec<KeyValuePair> {
    match Url::parse(url) {
        Ok(parsed) => {
            let params: Vec<KeyValuePair> = parsed
                .query_pairs()
                .map(|(k, v)| KeyValuePair::new(&k, &v))
                .collect();
            if params.is_empty() {
                vec![KeyValuePair::blank()]
            } else {
                params
            }
        }
        Err(_) => match url.split_once('?') {
            Some((_, query)) => query
                .split('&')
                .map(|param| {
                    let (key, value) = param.split_once('=').unwrap_or((param, ""));
                    KeyValuePair::new(&decode(key), &decode(value))
                })
                .collect(),
            None => vec![KeyValuePair::blank()],
        },
    }
}

/// Replace the query string of `base_url` with the enabled params
pub fn build_url_with_params(base_url: &str, params: &[KeyValuePair]) -> String {
    // Later rows win for repeated keys
    let enabled: IndexMap<&str, &str> = params
        .iter()
        .filter(|p| p.is_usable())
        .map(|p| (p.key.as_str(), p.value.as_str()))
        .collect();

    if enabled.is_empty() {
        return base_url.to_string();
    }

    if let Ok(mut url) = Url::parse(base_url) {
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &enabled {
                pairs.append_pair(key, value);
            }
        }
        return url.to_string();
    }

    let (url_base, query) = base_url.split_once('?').unwrap_or((base_url, ""));
    let kept: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| !enabled.contains_key(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let cleaned = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish();
    let added = enabled
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let query = [cleaned, added]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", url_base, query)
}

/// Header map as editable rows; a single blank row when empty
pub fn parse_headers(headers: &HeaderMap) -> Vec<KeyValuePair> {
    if headers.is_empty() {
        return vec![KeyValuePair::blank()];
    }
    headers.iter().map(|(k, v)| KeyValuePair::new(k, v)).collect()
}

/// Header map from the enabled, non-blank rows
pub fn build_headers_from_pairs(pairs: &[KeyValuePair]) -> HeaderMap {
    pairs
        .iter()
        .filter(|p| p.is_usable())
        .map(|p| (p.key.clone(), p.value.clone()))
        .collect()
}
