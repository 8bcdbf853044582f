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

//! API to replace the contents of a prescription.

use crate::driver::Driver;
use crate::rest::parse_prescription_id;
use crate::model::PrescriptionFields;
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use receituario_core::rest::RestError;

/// API handler.
///
/// Fields missing from the request are cleared.  The prescription number and any timestamps in
/// the request are ignored.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<String>,
    Json(fields): Json<PrescriptionFields>,
) -> Result<impl IntoResponse, RestError> {
    let id = parse_prescription_id(&id)?;
    let prescription = driver.update_prescription(id, fields).await?;
    Ok(Json(prescription))
}
