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

//! API to consume the next prescription number.

use crate::driver::Driver;
use crate::model::{RxNo, SequenceNumber};
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use receituario_core::rest::RestError;
use serde::{Deserialize, Serialize};

/// Message returned by the server after consuming a number.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct CounterNextResponse {
    /// The number that was consumed.
    pub(crate) consumed: SequenceNumber,

    /// Prescription number derived from `consumed`.
    #[serde(rename = "rxNo")]
    pub(crate) rx_no: RxNo,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
) -> Result<impl IntoResponse, RestError> {
    let consumed = driver.advance_counter().await?;
    Ok(Json(CounterNextResponse { consumed, rx_no: RxNo::from(consumed) }))
}
