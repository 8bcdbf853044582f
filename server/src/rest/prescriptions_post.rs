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

//! API to create a prescription.

use crate::driver::Driver;
use crate::model::{PrescriptionFields, RxNo};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, http};
use receituario_core::rest::RestError;
use serde::{Deserialize, Serialize};

/// Message sent to the server to create a prescription.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct CreatePrescriptionRequest {
    /// Number to assign to the prescription.  If missing or empty, the next number from the
    /// counter is used.
    #[serde(default, rename = "rxNo")]
    pub(crate) rx_no: Option<String>,

    /// Contents of the prescription.
    #[serde(flatten)]
    pub(crate) fields: PrescriptionFields,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<impl IntoResponse, RestError> {
    let rx_no = match request.rx_no {
        Some(rx_no) if !rx_no.is_empty() => Some(RxNo::new(rx_no)?),
        _ => None,
    };

    let prescription = driver.create_prescription(rx_no, request.fields).await?;
    Ok((http::StatusCode::CREATED, Json(prescription)))
}
