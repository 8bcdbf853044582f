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

//! In-memory filtering of prescription listings.

use crate::model::Prescription;

/// Returns true if `needle`, which must already be lowercase, is contained in `haystack`
/// ignoring case.
fn contains_lowercase(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Returns true if `prescription` matches the lowercase `query`.
fn matches(prescription: &Prescription, query: &str) -> bool {
    let fields = prescription.fields();
    [
        prescription.rx_no().as_str(),
        fields.paciente(),
        fields.data(),
        fields.diag(),
        fields.presc(),
    ]
    .iter()
    .any(|field| contains_lowercase(field, query))
}

/// Keeps the `prescriptions` that contain `query` in their number, patient, date, diagnosis or
/// prescription text, ignoring case.
///
/// An empty query matches everything.  The relative order of the input is preserved.
pub(super) fn filter(prescriptions: Vec<Prescription>, query: &str) -> Vec<Prescription> {
    if query.is_empty() {
        return prescriptions;
    }

    let query = query.to_lowercase();
    prescriptions.into_iter().filter(|p| matches(p, &query)).collect()
}
