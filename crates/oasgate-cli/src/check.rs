//! # Check Subcommands
//!
//! `check-request` and `check-response` run the validators over recorded
//! traffic. Fixtures are JSON:
//!
//! ```json
//! {"method": "GET", "url": "/v1/pets?limit=3", "headers": {"cookie": "session=abc"}}
//! {"request": {"method": "GET", "url": "/v1/pets"}, "status": 200,
//!  "headers": {"content-type": "application/json"}, "body": [{"id": 1, "name": "rex"}]}
//! ```
//!
//! Routing uses the same route table as the middleware, so base paths and
//! `ignorePaths` apply; a fixture outside the API is reported as skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use oasgate_core::{
    ApiDocument, ApiRequest, RequestValidator, ResponseValidator, RouteTable, ValidationError,
    ValidatorOptions,
};

/// Arguments for the `oasgate check-request` subcommand.
#[derive(Args, Debug)]
pub struct CheckRequestArgs {
    /// OpenAPI 3 document (YAML or JSON).
    #[arg(long, value_name = "DOCUMENT")]
    pub spec: PathBuf,

    /// Request fixture (JSON).
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,

    /// Print the normalized request when it is valid.
    #[arg(long)]
    pub print_normalized: bool,
}

/// Arguments for the `oasgate check-response` subcommand.
#[derive(Args, Debug)]
pub struct CheckResponseArgs {
    /// OpenAPI 3 document (YAML or JSON).
    #[arg(long, value_name = "DOCUMENT")]
    pub spec: PathBuf,

    /// Response fixture (JSON), including the request it answers.
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,
}

/// A recorded request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFixture {
    pub method: String,
    /// Path and query string.
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Cookies an upstream layer has already verified.
    #[serde(default)]
    pub signed_cookies: Map<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl RequestFixture {
    /// The request as the validators see it, routed through `routes`.
    pub fn to_request(&self, routes: &RouteTable) -> ApiRequest {
        let headers = self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        let mut request = ApiRequest::from_parts(&self.method, &self.url, headers);
        request.signed_cookies = self.signed_cookies.clone();
        request.body = self.body.clone();
        request.openapi = routes.resolve(&request.method, &request.path);
        request
    }
}

/// A recorded response and the request that produced it.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFixture {
    pub request: RequestFixture,
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl ResponseFixture {
    fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

fn load_document(path: &Path) -> Result<Arc<ApiDocument>> {
    let doc = ApiDocument::from_path(path)
        .with_context(|| format!("failed to load OpenAPI document {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded OpenAPI document");
    Ok(Arc::new(doc))
}

fn read_fixture<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("malformed fixture {}", path.display()))
}

fn route_table(doc: &Arc<ApiDocument>, options: &ValidatorOptions) -> Result<RouteTable> {
    Ok(RouteTable::new(Arc::clone(doc))
        .context("document path templates do not compile")?
        .with_ignore_paths(options.ignore_paths_regex()?))
}

fn report(err: &ValidationError) {
    println!("FAIL: {} {}: {}", err.status, err.code(), err.message);
    for item in &err.errors {
        match &item.error_code {
            Some(code) => println!("  {}: {} ({code})", item.path, item.message),
            None => println!("  {}: {}", item.path, item.message),
        }
    }
}

/// Execute the check-request subcommand.
///
/// Returns exit code: 0 when valid or skipped, 1 on a violation.
pub fn run_check_request(args: &CheckRequestArgs, options: &ValidatorOptions) -> Result<u8> {
    let doc = load_document(&args.spec)?;
    let fixture: RequestFixture = read_fixture(&args.fixture)?;
    let routes = route_table(&doc, options)?;
    let mut request = fixture.to_request(&routes);

    if request.openapi.is_none() {
        println!("SKIP: {} {} is not managed by the document", request.method, request.path);
        return Ok(0);
    }
    if options.validate_requests.is_none() {
        println!("SKIP: request validation is disabled");
        return Ok(0);
    }

    let validator = RequestValidator::new(doc, options);
    match validator.validate(&mut request) {
        Ok(()) => {
            println!("OK: {} {}", request.method, request.path);
            if args.print_normalized {
                println!("{}", serde_json::to_string_pretty(&request)?);
            }
            Ok(0)
        }
        Err(err) => {
            report(&err);
            Ok(1)
        }
    }
}

/// Execute the check-response subcommand. Response validation runs even
/// when the options leave it disabled for servers; `removeAdditional` is
/// honoured when configured.
///
/// Returns exit code: 0 when valid or skipped, 1 on a violation.
pub fn run_check_response(args: &CheckResponseArgs, options: &ValidatorOptions) -> Result<u8> {
    let doc = load_document(&args.spec)?;
    let fixture: ResponseFixture = read_fixture(&args.fixture)?;
    let routes = route_table(&doc, options)?;
    let request = fixture.request.to_request(&routes);

    if request.openapi.is_none() {
        println!("SKIP: {} {} is not managed by the document", request.method, request.path);
        return Ok(0);
    }

    let validator = ResponseValidator::new(doc, options);
    let mut body = fixture.body.clone();
    match validator.validate(&request, fixture.status, fixture.content_type(), body.as_mut()) {
        Ok(()) => {
            println!("OK: {} {} -> {}", request.method, request.path, fixture.status);
            Ok(0)
        }
        Err(err) => {
            report(&err);
            Ok(1)
        }
    }
}
