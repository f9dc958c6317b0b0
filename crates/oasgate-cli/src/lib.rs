//! # oasgate-cli: Offline Contract Checks
//!
//! Provides the `oasgate` command-line interface: validate recorded
//! requests and responses (JSON fixtures) against an OpenAPI 3 document
//! without running a server.
//!
//! ## Subcommands
//!
//! - `oasgate check-request`: route, normalize and validate a request.
//! - `oasgate check-response`: validate a response for a request.
//!
//! ```bash
//! oasgate check-request --spec openapi.yaml fixtures/list-pets.json
//! oasgate --config oasgate.yaml check-response --spec openapi.yaml fixtures/pets-200.json
//! ```
//!
//! ## Exit Codes
//!
//! `0` valid, `1` contract violation, `2` operational error (unreadable
//! document, fixture or options).

pub mod check;

use std::path::Path;

use anyhow::{Context, Result};
use oasgate_core::ValidatorOptions;

/// Load validator options from `config`, or the defaults without one.
pub fn load_options(config: Option<&Path>) -> Result<ValidatorOptions> {
    match config {
        Some(path) => ValidatorOptions::from_path(path)
            .with_context(|| format!("failed to load options from {}", path.display())),
        None => Ok(ValidatorOptions::default()),
    }
}
