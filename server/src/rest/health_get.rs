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

//! API to check whether the service is alive.

use crate::driver::Driver;
use crate::model::Timestamp;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use receituario_core::rest::{EmptyBody, RestError};
use serde::{Deserialize, Serialize};

/// Message returned by the server after a successful health check.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct HealthResponse {
    /// Always true.
    pub(crate) ok: bool,

    /// Current server time.
    pub(crate) ts: Timestamp,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    _: EmptyBody,
) -> Result<impl IntoResponse, RestError> {
    Ok(Json(HealthResponse { ok: true, ts: driver.now() }))
}
