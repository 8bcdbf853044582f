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

//! Test utilities for the REST API.

use crate::driver::testutils::TestContext as DriverTestContext;
use crate::model::*;
use crate::rest::{RateLimiter, app};
use axum::Router;
use axum::http::HeaderValue;
use receituario_core::clocks::testutils::SettableClock;
use std::sync::Arc;

pub(crate) struct TestContext {
    driver_context: DriverTestContext,
    app: Router,
}

impl TestContext {
    /// Initializes the app with an in-memory database, no rate limits and any CORS origin.
    pub(crate) async fn setup() -> Self {
        Self::setup_with_options(0, vec![]).await
    }

    /// Initializes the app with an in-memory database, `rate_limit` requests per minute and
    /// `allowed_origins`.
    pub(crate) async fn setup_with_options(
        rate_limit: usize,
        allowed_origins: Vec<HeaderValue>,
    ) -> Self {
        let driver_context = DriverTestContext::setup().await;
        let limiter = Arc::new(RateLimiter::new(driver_context.clock(), rate_limit));
        let app = app(driver_context.driver(), limiter, allowed_origins);
        Self { driver_context, app }
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    pub(crate) fn clock(&self) -> Arc<SettableClock> {
        self.driver_context.clock()
    }

    pub(crate) async fn advance_counter(&self, n: u64) {
        self.driver_context.advance_counter(n).await
    }

    pub(crate) async fn set_last_number(&self, n: i64) {
        self.driver_context.set_last_number(n).await
    }

    pub(crate) async fn last_number(&self) -> u64 {
        self.driver_context.last_number().await
    }

    pub(crate) async fn put_prescription(
        &self,
        rx_no: &'static str,
        fields: PrescriptionFields,
    ) -> Prescription {
        self.driver_context.put_prescription(rx_no, fields).await
    }

    pub(crate) async fn list_prescriptions(&self) -> Vec<Prescription> {
        self.driver_context.list_prescriptions().await
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.driver_context.now()
    }
}
