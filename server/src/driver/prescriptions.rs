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

//! Operations on prescription records.

use crate::db;
use crate::driver::{Driver, search};
use crate::model::*;
use log::info;
use receituario_core::driver::DriverResult;

impl Driver {
    /// Creates a new prescription with `fields`.
    ///
    /// If `rx_no` is missing, the prescription is numbered by advancing the counter within the
    /// same transaction that stores the prescription, so both changes persist or neither does.
    /// An explicit `rx_no` leaves the counter untouched.
    pub(crate) async fn create_prescription(
        self,
        rx_no: Option<RxNo>,
        fields: PrescriptionFields,
    ) -> DriverResult<Prescription> {
        let now = self.now();

        let mut tx = self.db.begin().await?;
        let result = async {
            let rx_no = match rx_no {
                Some(rx_no) => rx_no,
                None => RxNo::from(db::advance_counter(tx.ex()).await?),
            };
            db::put_prescription(tx.ex(), rx_no, fields, now).await
        }
        .await;
        let prescription = tx.finish(result).await?;

        info!(
            "Created prescription {} with number {}",
            prescription.id(),
            prescription.rx_no()
        );
        Ok(prescription)
    }

    /// Gets the prescription identified by `id`.
    pub(crate) async fn get_prescription(self, id: PrescriptionId) -> DriverResult<Prescription> {
        let prescription = db::get_prescription(&mut self.db.ex().await?, id).await?;
        Ok(prescription)
    }

    /// Gets all prescriptions, newest first, keeping only those that match `query` if given.
    pub(crate) async fn list_prescriptions(
        self,
        query: Option<String>,
    ) -> DriverResult<Vec<Prescription>> {
        let prescriptions = db::list_prescriptions(&mut self.db.ex().await?).await?;
        match query {
            Some(query) => Ok(search::filter(prescriptions, &query)),
            None => Ok(prescriptions),
        }
    }

    /// Replaces all mutable fields of the prescription identified by `id` with `fields`.
    pub(crate) async fn update_prescription(
        self,
        id: PrescriptionId,
        fields: PrescriptionFields,
    ) -> DriverResult<Prescription> {
        let now = self.now();
        let prescription = db::update_prescription(&mut self.db.ex().await?, id, &fields, now).await?;
        Ok(prescription)
    }

    /// Deletes the prescription identified by `id`.
    pub(crate) async fn delete_prescription(self, id: PrescriptionId) -> DriverResult<()> {
        db::delete_prescription(&mut self.db.ex().await?, id).await?;
        info!("Deleted prescription {}", id);
        Ok(())
    }
}
