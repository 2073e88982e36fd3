use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters attached to a media range, e.g. `q` or `version`
pub type MediaTypeParams = HashMap<String, String>;

/// Parsed form of a single `Accept` header entry.
///
/// `raw` always holds the media-type token with its parameters stripped, even
/// when the token does not look like `type/subtype`. In that case `main_type`,
/// `subtype` and `suffix` are left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub raw: String,
    #[serde(rename = "type")]
    pub main_type: String,
    pub tree: String,
    pub subtype: String,
    pub suffix: String,
    pub parameters: MediaTypeParams,
}

impl MediaType {
    /// `application/json` or any `application/*+json`
    pub fn is_json(&self) -> bool {
        self.main_type == "application" && (self.subtype == "json" || self.suffix == "json")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptHeader {
    pub media_type: MediaType,
    pub quality: f64,
}

/// Accept entries in the order they appeared in the header
pub type AcceptHeaders = Vec<AcceptHeader>;

const DEFAULT_QUALITY: f64 = 1.0;

// type "/" [tree "."] subtype ["+" suffix]
static MEDIA_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\w*\-]+)/([\w*.\-]+)(\+(\w+))?").expect("media type pattern must compile")
});

/// Parse an `Accept` header value.
///
/// Never fails and never returns an empty list: an empty header yields a single
/// default entry with quality 1.0. Entries are not re-ordered by quality.
pub fn parse_accept_header(value: &str) -> AcceptHeaders {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();

    compact
        .split(',')
        .map(|candidate| {
            let media_type = parse_media_type(candidate);
            let quality = match media_type.param("q") {
                Some(q) if !q.is_empty() => q.parse::<f64>().unwrap_or(DEFAULT_QUALITY),
                _ => DEFAULT_QUALITY,
            };
            AcceptHeader { media_type, quality }
        })
        .collect()
}

/// Parse `application/vnd.api+json;q=0.8;version=1.0` into a [`MediaType`]
fn parse_media_type(candidate: &str) -> MediaType {
    let mut tokens = candidate.split(';');
    let mut media_type = MediaType {
        raw: tokens.next().unwrap_or_default().to_string(),
        ..Default::default()
    };

    let param_tokens: Vec<&str> = tokens.collect();
    if param_tokens.first().is_some_and(|first| !first.is_empty()) {
        for token in param_tokens {
            let mut pair = token.split('=');
            let key = pair.next().unwrap_or_default();
            let value = pair.next().unwrap_or_default();
            media_type.parameters.insert(key.to_string(), value.to_string());
        }
    }

    let Some(captures) = MEDIA_TYPE_RE.captures(&media_type.raw) else {
        return media_type;
    };

    let main_type = captures.get(1).map_or("", |m| m.as_str()).to_string();
    let subtype = captures.get(2).map_or("", |m| m.as_str()).to_string();
    let suffix = captures.get(4).map_or("", |m| m.as_str()).to_string();

    media_type.main_type = main_type;
    media_type.suffix = suffix;

    // Only the first dotted segment is the tree; the remainder stays the subtype
    match subtype.split_once('.') {
        Some((tree, rest)) if !tree.is_empty() => {
            media_type.tree = tree.to_string();
            media_type.subtype = rest.to_string();
        }
        _ => media_type.subtype = subtype,
    }

    media_type
}
