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

//! API to list prescriptions, optionally filtered by a search query.

use crate::driver::Driver;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use receituario_core::rest::RestError;
use serde::Deserialize;

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct ListQuery {
    /// Text to look for in the prescriptions.  An empty or missing query matches everything.
    #[serde(default)]
    q: Option<String>,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, RestError> {
    let prescriptions = driver.list_prescriptions(query.q).await?;
    Ok(Json(prescriptions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use receituario_core::rest::testutils::*;
    use std::time::Duration;

    fn route() -> (http::Method, String) {
        (http::Method::GET, "/prescriptions".to_owned())
    }

    /// Populates the store with a few prescriptions and returns them newest first.
    async fn populate(context: &TestContext) -> Vec<Prescription> {
        let mut prescriptions = vec![];
        for (rx_no, paciente, diag) in [
            ("000001", "Ana Silva", "Gripe"),
            ("000002", "Bruno Souza", "Sinusite"),
            ("000003", "Carla Dias", "Gripe forte"),
        ] {
            prescriptions.push(
                context
                    .put_prescription(
                        rx_no,
                        PrescriptionFields::default().with_paciente(paciente).with_diag(diag),
                    )
                    .await,
            );
            context.clock().advance(Duration::from_secs(1));
        }
        prescriptions.reverse();
        prescriptions
    }

    #[tokio::test]
    async fn test_empty() {
        let context = TestContext::setup().await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_all_newest_first() {
        let context = TestContext::setup().await;

        let exp = populate(&context).await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert_eq!(exp, response);
    }

    #[tokio::test]
    async fn test_empty_query_matches_all() {
        let context = TestContext::setup().await;

        let exp = populate(&context).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_query(ListQuery { q: Some("".to_owned()) })
            .send_empty()
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert_eq!(exp, response);
    }

    #[tokio::test]
    async fn test_query_case_insensitive() {
        let context = TestContext::setup().await;

        let all = populate(&context).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_query(ListQuery { q: Some("ana".to_owned()) })
            .send_empty()
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert_eq!(vec![all[2].clone()], response);
    }

    #[tokio::test]
    async fn test_query_keeps_order() {
        let context = TestContext::setup().await;

        let all = populate(&context).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_query(ListQuery { q: Some("GRIPE".to_owned()) })
            .send_empty()
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert_eq!(vec![all[0].clone(), all[2].clone()], response);
    }

    #[tokio::test]
    async fn test_body_ignored() {
        let context = TestContext::setup().await;

        let exp = populate(&context).await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_text("anything")
            .await
            .expect_json::<Vec<Prescription>>()
            .await;
        assert_eq!(exp, response);
    }
}
