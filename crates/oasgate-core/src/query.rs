//! # Query String and Cookie Decoding
//!
//! Query strings decode the way Node's `qs` does, since that is what the
//! parameter mutator expects to find:
//!
//! - `a=1&a=2` → `{"a": ["1", "2"]}`
//! - `filter[name]=x` → `{"filter": {"name": "x"}}`
//! - `ids[]=1&ids[]=2` and `ids[0]=1&ids[1]=2` → `{"ids": ["1", "2"]}`
//!
//! Values stay strings; typing them is the validator's job.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Bracket nesting deeper than this is kept in the key verbatim.
const MAX_DEPTH: usize = 5;

/// Decode a raw query string (without the leading `?`).
pub fn parse_query(raw: &str) -> Map<String, Value> {
    let mut query = Map::new();
    for (key, value) in form_urlencoded::parse(raw.trim_start_matches('?').as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key);
        insert(&mut query, &segments, Value::String(value.into_owned()));
    }
    query
}

/// The query part of a request target, if any.
pub fn query_part(original_url: &str) -> Option<&str> {
    original_url.split_once('?').map(|(_, query)| query)
}

/// `a[b][]` → `["a", "b", ""]`. Unbalanced brackets leave the key whole.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return vec![key.to_string()];
    };
    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        if segments.len() > MAX_DEPTH {
            break;
        }
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    if !rest.is_empty() {
        // `a[b]c`: text after the last bracket stays with the final segment.
        if let Some(last) = segments.last_mut() {
            last.push_str(rest);
        }
    }
    segments
}

fn is_index(segment: &str) -> bool {
    segment.is_empty() || segment.bytes().all(|b| b.is_ascii_digit())
}

fn insert(target: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match rest.split_first() {
        None => match target.get_mut(head) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                target.insert(head.clone(), value);
            }
        },
        Some((next, _)) if is_index(next) && rest.len() == 1 => {
            match target
                .entry(head.clone())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(value),
                Value::Object(object) => {
                    let key = object.len().to_string();
                    object.insert(key, value);
                }
                existing => {
                    let first = std::mem::take(existing);
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
        Some(_) => {
            let child = target
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !matches!(*child, Value::Array(_) | Value::Object(_)) {
                // `a=1&a[b]=2`: qs keeps both as `["1", {"b": "2"}]`.
                let mut nested = Map::new();
                insert(&mut nested, rest, value);
                let first = std::mem::take(child);
                *child = Value::Array(vec![first, Value::Object(nested)]);
                return;
            }
            if let Value::Array(items) = &mut *child {
                // `a[]=x&a[b]=y`: qs turns the array into an index-keyed object.
                let object: Map<String, Value> = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect();
                *child = Value::Object(object);
            }
            if let Value::Object(object) = &mut *child {
                insert(object, rest, value);
            }
        }
    }
}

/// Decode a `Cookie` header. The first occurrence of a name wins;
/// double-quoted values are unquoted and percent-decoded.
pub fn parse_cookies(header: &str) -> Map<String, Value> {
    let mut cookies = Map::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        cookies.insert(name.to_string(), Value::String(percent_decode(value)));
    }
    cookies
}

/// Percent-decode a path segment or cookie value; `+` stays literal.
pub fn percent_decode(value: &str) -> String {
    let escaped = value
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}
