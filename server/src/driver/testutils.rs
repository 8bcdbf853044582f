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

//! Test utilities for the business layer.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use receituario_core::clocks::testutils::SettableClock;
use receituario_core::db::{Db, Executor};
use std::sync::Arc;
use time::macros::datetime;

/// State of a running test.
pub(crate) struct TestContext {
    /// The database backing the driver.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock backing the driver, which tests can move at will.
    clock: Arc<SettableClock>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Initializes the driver using an in-memory database and a settable clock.
    pub(crate) async fn setup() -> Self {
        let db = Arc::new(receituario_core::db::sqlite::testutils::setup().await);
        Self::setup_with(db).await
    }

    /// Initializes the driver using the given already-connected `db`.
    pub(crate) async fn setup_with(db: Arc<dyn Db + Send + Sync>) -> Self {
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let clock = Arc::new(SettableClock::new(datetime!(2024-03-01 12:00:00 UTC)));
        let driver = Driver::new(db.clone(), clock.clone());
        Self { db, clock, driver }
    }

    /// Gets a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Gets the clock used by the driver.
    pub(crate) fn clock(&self) -> Arc<SettableClock> {
        self.clock.clone()
    }

    /// Gets a copy of the driver in this test context.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Advances the counter `n` times behind the driver's back.
    pub(crate) async fn advance_counter(&self, n: u64) {
        for _ in 0..n {
            let mut tx = self.db.begin().await.unwrap();
            db::advance_counter(tx.ex()).await.unwrap();
            tx.commit().await.unwrap();
        }
    }

    /// Sets the last number issued by the counter to `n` behind the driver's back.
    pub(crate) async fn set_last_number(&self, n: i64) {
        match self.ex().await {
            Executor::Sqlite(mut ex) => {
                sqlx::query("UPDATE counter SET last_number = ? WHERE id = 1")
                    .bind(n)
                    .execute(ex.conn())
                    .await
                    .unwrap();
            }

            #[allow(unused)]
            _ => unreachable!(),
        }
    }

    /// Gets the last number issued by the counter.
    pub(crate) async fn last_number(&self) -> u64 {
        db::get_counter(&mut self.ex().await).await.unwrap().as_u64()
    }

    /// Inserts a prescription numbered `rx_no` behind the driver's back.
    pub(crate) async fn put_prescription(
        &self,
        rx_no: &'static str,
        fields: PrescriptionFields,
    ) -> Prescription {
        db::put_prescription(&mut self.ex().await, RxNo::new(rx_no).unwrap(), fields, self.now())
            .await
            .unwrap()
    }

    /// Gets all prescriptions.
    pub(crate) async fn list_prescriptions(&self) -> Vec<Prescription> {
        db::list_prescriptions(&mut self.ex().await).await.unwrap()
    }

    /// Gets the current time as known by the driver.
    pub(crate) fn now(&self) -> Timestamp {
        self.driver.now()
    }

    /// Closes the database.
    pub(crate) async fn close(self) {
        drop(self.driver);
        self.db.close().await;
    }
}
