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

//! High-level data types.

use derive_getters::Getters;
use derive_more::{Constructor, Display};
use receituario_core::model::{ModelError, ModelResult};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Minimum number of digits in the textual form of a prescription number.
const RX_NO_MIN_DIGITS: usize = 6;

/// A value of the prescription counter.
///
/// We store this as an `u64` but guarantee that it fits in an `i64` because that's what the
/// database backends store.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub(crate) struct SequenceNumber(u64);

impl SequenceNumber {
    /// Creates a sequence number from an `i64` with range validation.
    pub(crate) fn from_i64(n: i64) -> ModelResult<Self> {
        match u64::try_from(n) {
            Ok(n) => Ok(Self(n)),
            Err(e) => Err(ModelError(format!("Sequence number {} cannot be represented: {}", n, e))),
        }
    }

    /// Creates a sequence number from a `u64` with range validation.
    #[cfg(test)]
    pub(crate) fn from_u64(n: u64) -> ModelResult<Self> {
        match i64::try_from(n) {
            Ok(_) => Ok(Self(n)),
            Err(e) => Err(ModelError(format!("Sequence number {} cannot be represented: {}", n, e))),
        }
    }

    /// Returns the sequence number that follows this one.
    pub(crate) fn next(self) -> ModelResult<Self> {
        match self.0.checked_add(1) {
            Some(n) if i64::try_from(n).is_ok() => Ok(Self(n)),
            _ => Err(ModelError("Sequence number exhausted".to_owned())),
        }
    }

    /// Returns the sequence number as a `u64`.
    pub(crate) fn as_u64(self) -> u64 {
        self.0
    }
}

/// Human-facing prescription number.
///
/// Numbers derived from the counter are zero-padded to at least six digits.  Numbers supplied
/// by clients are kept verbatim.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct RxNo(String);

impl RxNo {
    /// Creates a new prescription number from a client-supplied `s`, which cannot be empty.
    pub(crate) fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(ModelError("Prescription number cannot be empty".to_owned()));
        }
        Ok(Self(s))
    }

    /// Returns a string view of the prescription number.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SequenceNumber> for RxNo {
    fn from(n: SequenceNumber) -> Self {
        Self(format!("{:0width$}", n.as_u64(), width = RX_NO_MIN_DIGITS))
    }
}

impl<'de> Deserialize<'de> for RxNo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RxNo::new(s).map_err(serde::de::Error::custom)
    }
}

/// Store-assigned identifier of a prescription.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct PrescriptionId(i64);

impl PrescriptionId {
    /// Wraps a raw identifier.
    pub(crate) fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the identifier as an `i64`.
    pub(crate) fn as_i64(self) -> i64 {
        self.0
    }
}

/// A point in time with millisecond precision, exposed as milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "i64", try_from = "i64")]
pub(crate) struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub(crate) fn from_millis(ms: i64) -> ModelResult<Self> {
        match OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000) {
            Ok(dt) => Ok(Self(dt)),
            Err(e) => Err(ModelError(format!("Invalid timestamp {}: {}", ms, e))),
        }
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    pub(crate) fn as_millis(self) -> i64 {
        i64::try_from(self.0.unix_timestamp_nanos() / 1_000_000)
            .expect("Millisecond timestamps within the OffsetDateTime range fit in an i64")
    }
}

impl From<OffsetDateTime> for Timestamp {
    /// Truncates `dt` to millisecond precision.
    fn from(dt: OffsetDateTime) -> Self {
        let nanos = dt.unix_timestamp_nanos() / 1_000_000 * 1_000_000;
        Self(
            OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .expect("Truncating towards zero stays within range"),
        )
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.as_millis()
    }
}

impl TryFrom<i64> for Timestamp {
    type Error = ModelError;

    fn try_from(ms: i64) -> ModelResult<Self> {
        Timestamp::from_millis(ms)
    }
}

/// Deserializes a textual field, mapping `null` to the empty string and accepting scalars such
/// as numbers in their textual form.
fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Ok(b.to_string()),
        Some(v) => Err(serde::de::Error::custom(format!("expected a string but got {}", v))),
    }
}

/// The mutable contents of a prescription.  Missing fields are empty.
#[derive(Clone, Constructor, Debug, Default, Deserialize, Eq, Getters, PartialEq, Serialize)]
pub(crate) struct PrescriptionFields {
    /// Name of the patient.
    #[serde(default, deserialize_with = "string_or_empty")]
    paciente: String,

    /// Address of the patient.
    #[serde(default, deserialize_with = "string_or_empty")]
    endereco: String,

    /// Age of the patient, free-form.
    #[serde(default, deserialize_with = "string_or_empty")]
    idade: String,

    /// Date of the prescription, free-form.
    #[serde(default, deserialize_with = "string_or_empty")]
    data: String,

    /// Diagnosis.
    #[serde(default, deserialize_with = "string_or_empty")]
    diag: String,

    /// Prescription text.
    #[serde(default, deserialize_with = "string_or_empty")]
    presc: String,
}

impl PrescriptionFields {
    /// Sets the patient name.
    #[cfg(test)]
    pub(crate) fn with_paciente<S: Into<String>>(mut self, paciente: S) -> Self {
        self.paciente = paciente.into();
        self
    }

    /// Sets the date.
    #[cfg(test)]
    pub(crate) fn with_data<S: Into<String>>(mut self, data: S) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the diagnosis.
    #[cfg(test)]
    pub(crate) fn with_diag<S: Into<String>>(mut self, diag: S) -> Self {
        self.diag = diag.into();
        self
    }

    /// Sets the prescription text.
    #[cfg(test)]
    pub(crate) fn with_presc<S: Into<String>>(mut self, presc: S) -> Self {
        self.presc = presc.into();
        self
    }
}

/// A persisted prescription.
#[derive(Clone, Constructor, Debug, Deserialize, Eq, Getters, PartialEq, Serialize)]
pub(crate) struct Prescription {
    /// Store-assigned identifier.
    id: PrescriptionId,

    /// Prescription number.  Immutable once assigned.
    #[serde(rename = "rxNo")]
    rx_no: RxNo,

    /// Mutable contents.
    #[serde(flatten)]
    fields: PrescriptionFields,

    /// Creation time.  Immutable once assigned.
    #[serde(rename = "createdAt")]
    created_at: Timestamp,

    /// Time of the last modification, never earlier than `created_at`.
    #[serde(rename = "updatedAt")]
    updated_at: Timestamp,
}
