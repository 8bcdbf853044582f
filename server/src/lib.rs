// Receituario
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Prescription records service.
//!
//! The service issues sequential prescription numbers out of a persistent counter and stores
//! prescription records, exposing both through a JSON REST API.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use axum::http::HeaderValue;
use log::{info, warn};
use receituario_core::clocks::SystemClock;
use receituario_core::db::Db;
use receituario_core::env::get_optional_var;
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod db;
mod driver;
use driver::Driver;
pub(crate) mod model;
mod rest;
use rest::{RateLimiter, app};

/// Default TCP port to listen on.
const DEFAULT_PORT: u16 = 8080;

/// Default location of the SQLite database.
const DEFAULT_DB_PATH: &str = "./data/receitas.db";

/// Default maximum number of requests per client per minute.
const DEFAULT_RATE_LIMIT_PER_MINUTE: usize = 120;

/// Configuration of the server.
#[derive(Debug, PartialEq)]
pub struct ServerOptions {
    /// TCP port to listen on, on all interfaces.
    port: u16,

    /// Path to the SQLite database.
    db_path: PathBuf,

    /// Origins allowed to issue cross-origin requests.  Empty allows any origin.
    allowed_origins: Vec<HeaderValue>,

    /// Maximum number of requests per client per minute.  Zero disables rate limiting.
    rate_limit_per_minute: usize,
}

impl ServerOptions {
    /// Initializes a set of options from environment variables, using defaults for those that
    /// are missing.
    ///
    /// This uses the variables `PORT`, `DB_PATH`, `ALLOWED_ORIGINS` (comma-separated) and
    /// `RATE_LIMIT_PER_MINUTE`.
    pub fn from_env() -> Result<ServerOptions, String> {
        let allowed_origins = match get_optional_var::<String>("", "ALLOWED_ORIGINS")? {
            Some(origins) => parse_origins(&origins)?,
            None => vec![],
        };

        Ok(ServerOptions {
            port: get_optional_var::<u16>("", "PORT")?.unwrap_or(DEFAULT_PORT),
            db_path: get_optional_var::<PathBuf>("", "DB_PATH")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            allowed_origins,
            rate_limit_per_minute: get_optional_var::<usize>("", "RATE_LIMIT_PER_MINUTE")?
                .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE),
        })
    }

    /// Returns the path to the SQLite database.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Parses a comma-separated list of CORS `origins`, ignoring blanks.
fn parse_origins(origins: &str) -> Result<Vec<HeaderValue>, String> {
    let mut parsed = vec![];
    for origin in origins.split(',') {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(e) => return Err(format!("Invalid origin '{}' in ALLOWED_ORIGINS: {}", origin, e)),
        }
    }
    Ok(parsed)
}

/// Loads variables from the `.env`-style file at `path` into the environment.
///
/// Variables already present in the environment keep their values.  Returns whether the file
/// existed.
pub fn load_env_file(path: &Path) -> Result<bool, String> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(format!("Cannot load {}: {}", path.display(), e)),
    }
}

/// Waits until the process is asked to terminate.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!("Cannot wait for termination signals: {}", e);
            futures::future::pending::<()>().await
        }
    }
}

/// Instantiates all resources to serve the application with `opts` backed by `db`, which
/// must have already been initialized with the schema.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(
    opts: ServerOptions,
    db: Arc<dyn Db + Send + Sync>,
) -> Result<(), Box<dyn Error>> {
    let clock = Arc::new(SystemClock::default());
    let driver = Driver::new(db.clone(), clock.clone());
    let limiter = Arc::new(RateLimiter::new(clock, opts.rate_limit_per_minute));
    let app = app(driver, limiter, opts.allowed_origins);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, opts.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    Ok(())
}
