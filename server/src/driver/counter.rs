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

//! Operations on the prescription number counter.

use crate::db;
use crate::driver::Driver;
use crate::model::SequenceNumber;
use log::debug;
use receituario_core::driver::DriverResult;

impl Driver {
    /// Gets the last issued number and the number that the next advance would issue, without
    /// consuming anything.
    pub(crate) async fn preview_counter(self) -> DriverResult<(SequenceNumber, SequenceNumber)> {
        let last = db::get_counter(&mut self.db.ex().await?).await?;
        let next = last.next()?;
        Ok((last, next))
    }

    /// Consumes the next number from the counter.
    ///
    /// Concurrent calls never return the same number.  If the transaction fails, the counter is
    /// left untouched and the error is returned as is: there are no retries.
    pub(crate) async fn advance_counter(self) -> DriverResult<SequenceNumber> {
        let mut tx = self.db.begin().await?;
        let result = db::advance_counter(tx.ex()).await;
        let next = tx.finish(result).await?;
        debug!("Consumed prescription number {}", next.as_u64());
        Ok(next)
    }
}
