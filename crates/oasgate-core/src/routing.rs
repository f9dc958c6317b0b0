//! # Route Metadata
//!
//! Matches request paths against the document's path templates and builds
//! the [`RequestContext`] the validators consume. Server URLs contribute
//! base paths (`https://api.example.com/v1` → `/v1`); paths outside every
//! base path, or matching `ignorePaths`, are not managed and get no
//! context at all.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::document::ApiDocument;
use crate::query::percent_decode;
use crate::request::RequestContext;

/// One compiled path template.
#[derive(Debug, Clone)]
struct RouteEntry {
    template: String,
    pattern: Regex,
    param_names: Vec<String>,
    literal_len: usize,
}

impl RouteEntry {
    fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut param_names = Vec::new();
        let mut literal_len = 0;
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            pattern.push_str(&regex::escape(&rest[..open]));
            literal_len += open;
            pattern.push_str("([^/]+)");
            param_names.push(rest[open + 1..close].to_string());
            rest = &rest[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        literal_len += rest.len();
        pattern.push_str("/?$");

        Ok(Self {
            template: template.to_string(),
            pattern: Regex::new(&pattern)?,
            param_names,
            literal_len,
        })
    }

    fn captures(&self, path: &str) -> Option<Map<String, Value>> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.param_names
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, m)| {
                    m.map(|m| (name.clone(), Value::String(percent_decode(m.as_str()))))
                })
                .collect(),
        )
    }
}

/// Path templates of a document, ready for matching.
#[derive(Debug, Clone)]
pub struct RouteTable {
    doc: Arc<ApiDocument>,
    base_paths: Vec<String>,
    routes: Vec<RouteEntry>,
    ignore_paths: Option<Regex>,
}

impl RouteTable {
    /// Compile the document's `paths`. Literal templates are tried before
    /// templated ones (`/pets/mine` before `/pets/{id}`).
    pub fn new(doc: Arc<ApiDocument>) -> Result<Self, regex::Error> {
        let mut routes = doc
            .paths()
            .map(|paths| paths.keys().map(|t| RouteEntry::compile(t)).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        routes.sort_by(|a, b| {
            a.param_names
                .len()
                .cmp(&b.param_names.len())
                .then(b.literal_len.cmp(&a.literal_len))
        });

        let mut base_paths = doc.base_paths();
        base_paths.sort_by_key(|b| std::cmp::Reverse(b.len()));

        Ok(Self {
            doc,
            base_paths,
            routes,
            ignore_paths: None,
        })
    }

    /// Leave paths matching `pattern` unmanaged.
    pub fn with_ignore_paths(mut self, pattern: Option<Regex>) -> Self {
        self.ignore_paths = pattern;
        self
    }

    /// The routing context of a request, or `None` when the path is not
    /// part of the API.
    ///
    /// A managed path matching no template yields a context without a
    /// route (404); a template without `method` yields one without an
    /// operation (405).
    pub fn resolve(&self, method: &str, path: &str) -> Option<RequestContext> {
        if self.ignore_paths.as_ref().is_some_and(|re| re.is_match(path)) {
            return None;
        }

        let (base, relative) = self.base_paths.iter().find_map(|base| {
            let relative = path.strip_prefix(base.as_str())?;
            (relative.is_empty() || relative.starts_with('/')).then_some((base, relative))
        })?;
        let relative = if relative.is_empty() { "/" } else { relative };

        for route in &self.routes {
            if let Some(path_params) = route.captures(relative) {
                return Some(RequestContext {
                    matched_route: Some(format!("{base}{}", route.template)),
                    operation: self.doc.operation(&route.template, method).map(Arc::new),
                    path_params,
                });
            }
        }
        Some(RequestContext::default())
    }
}
