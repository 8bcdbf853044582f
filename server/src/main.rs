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

//! Entry point to the prescription records service.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use receituario::db::init_schema;
use receituario::{ServerOptions, load_env_file, serve};
use receituario_core::db::Db;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

/// Connects to the production PostgreSQL database configured via `PGSQL_PROD_*` variables.
#[cfg(feature = "postgres")]
async fn connect(_opts: &ServerOptions) -> Result<Arc<dyn Db + Send + Sync>, Box<dyn Error>> {
    use receituario_core::db::postgres::{PostgresDb, PostgresOptions};

    let db_opts = PostgresOptions::from_env("PGSQL_PROD")?;
    Ok(Arc::new(PostgresDb::connect(db_opts)?))
}

/// Connects to the SQLite database at the configured path, creating it if necessary.
#[cfg(not(feature = "postgres"))]
async fn connect(opts: &ServerOptions) -> Result<Arc<dyn Db + Send + Sync>, Box<dyn Error>> {
    use log::info;

    if let Some(parent) = opts.db_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("Cannot create database directory {}: {}", parent.display(), e)
            })?;
        }
    }

    let db_path = opts
        .db_path()
        .to_str()
        .ok_or_else(|| format!("Invalid database path {}", opts.db_path().display()))?;
    info!("Opening SQLite database {}", db_path);
    Ok(Arc::new(receituario_core::db::sqlite::connect(db_path).await?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let loaded_env_file = load_env_file(Path::new(".env"))?;
    env_logger::init();
    if loaded_env_file {
        log::info!("Loaded configuration from .env");
    }

    let opts = ServerOptions::from_env()?;
    let db = connect(&opts).await?;
    init_schema(&mut db.ex().await?).await?;

    serve(opts, db).await
}
