//! # Request Model
//!
//! The framework-neutral request the validators read and normalize in
//! place, plus the [`RequestContext`] the routing collaborator attaches.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::Operation;
use crate::parameters::ParameterLocation;
use crate::query;

/// What routing resolved for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// The matched path template, including any server base path.
    pub matched_route: Option<String>,
    /// The operation declared for the request method on that route.
    #[serde(skip)]
    pub operation: Option<Arc<Operation>>,
    /// Path parameters extracted by the router.
    pub path_params: Map<String, Value>,
}

/// An HTTP request as seen by the validators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Upper-case method.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Request target as received (path and query).
    pub original_url: String,
    /// Decoded query.
    pub query: Map<String, Value>,
    /// Headers, names lower-cased; repeated headers joined with `, `.
    pub headers: Map<String, Value>,
    /// Path parameters.
    pub params: Map<String, Value>,
    /// Cookies from the `Cookie` header.
    pub cookies: Map<String, Value>,
    /// Cookies whose signature a cookie layer has already verified.
    pub signed_cookies: Map<String, Value>,
    /// Parsed body, if one was sent.
    pub body: Option<Value>,
    /// Routing context; `None` when the path is outside the API.
    #[serde(skip)]
    pub openapi: Option<RequestContext>,
    /// Parameters already decoded from a JSON serialization; decoding one
    /// again would unwrap JSON-string values a second time.
    #[serde(skip)]
    pub decoded: BTreeSet<(ParameterLocation, String)>,
}

impl ApiRequest {
    /// A request for `method` on `original_url`, query decoded.
    pub fn new(method: &str, original_url: &str) -> Self {
        let path = original_url
            .split_once('?')
            .map_or(original_url, |(path, _)| path)
            .to_string();
        Self {
            method: method.to_ascii_uppercase(),
            path,
            original_url: original_url.to_string(),
            query: query::query_part(original_url)
                .map(query::parse_query)
                .unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Build a request from its head. The `Cookie` header also fills
    /// [`cookies`](Self::cookies).
    pub fn from_parts<'a, I>(method: &str, original_url: &str, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = Self::new(method, original_url);
        for (name, value) in headers {
            request.append_header(name, value);
        }
        if let Some(cookie) = request.header("cookie") {
            request.cookies = query::parse_cookies(cookie);
        }
        request
    }

    /// Add a header value, joining repeats with `, `.
    pub fn append_header(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.headers.get_mut(&name) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                self.headers.insert(name, Value::String(value.to_string()));
            }
        }
    }

    /// Builder form of [`append_header`](Self::append_header).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.append_header(name, value);
        self
    }

    /// Set the parsed body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach the routing context.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.openapi = Some(context);
        self
    }

    /// A header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    /// The field holding values for `location`.
    pub fn location(&self, location: ParameterLocation) -> &Map<String, Value> {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.headers,
            ParameterLocation::Path => &self.params,
            ParameterLocation::Cookie => &self.cookies,
        }
    }

    /// Mutable access to the field holding values for `location`.
    pub fn location_mut(&mut self, location: ParameterLocation) -> &mut Map<String, Value> {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Path => &mut self.params,
            ParameterLocation::Cookie => &mut self.cookies,
        }
    }

    /// True once `name` in `location` has been decoded from JSON.
    pub fn is_decoded(&self, location: ParameterLocation, name: &str) -> bool {
        self.decoded.contains(&(location, name.to_string()))
    }

    /// Parsed and signed cookies together; signed values win.
    pub fn all_cookies(&self) -> Map<String, Value> {
        let mut cookies = self.cookies.clone();
        cookies.extend(self.signed_cookies.clone());
        cookies
    }
}
