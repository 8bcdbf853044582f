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

//! Database abstraction in terms of the operations needed by the server.

use crate::model::*;
use futures::TryStreamExt;
#[cfg(feature = "postgres")]
use receituario_core::db::postgres;
#[cfg(any(feature = "sqlite", test))]
use receituario_core::db::sqlite;
use receituario_core::db::{DbError, DbResult, Executor};
use sqlx::Row;
#[cfg(feature = "postgres")]
use sqlx::postgres::PgRow;
#[cfg(any(feature = "sqlite", test))]
use sqlx::sqlite::SqliteRow;

#[cfg(test)]
mod tests;

/// Initializes the database schema.
///
/// This is idempotent: it creates the tables and the counter row only if they are missing.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::run_schema(ex, include_str!("postgres.sql")).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Builds a `Prescription` out of the raw values of a row.
fn build_prescription(
    id: i64,
    rx_no: String,
    fields: PrescriptionFields,
    created_at: i64,
    updated_at: i64,
) -> DbResult<Prescription> {
    Ok(Prescription::new(
        PrescriptionId::new(id),
        RxNo::new(rx_no)?,
        fields,
        Timestamp::from_millis(created_at)?,
        Timestamp::from_millis(updated_at)?,
    ))
}

#[cfg(feature = "postgres")]
impl TryFrom<PgRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let get = |name: &str| -> DbResult<String> {
            row.try_get(name).map_err(postgres::map_sqlx_error)
        };
        let fields = PrescriptionFields::new(
            get("paciente")?,
            get("endereco")?,
            get("idade")?,
            get("data")?,
            get("diag")?,
            get("presc")?,
        );

        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let rx_no: String = row.try_get("rx_no").map_err(postgres::map_sqlx_error)?;
        let created_at: i64 = row.try_get("created_at").map_err(postgres::map_sqlx_error)?;
        let updated_at: i64 = row.try_get("updated_at").map_err(postgres::map_sqlx_error)?;

        build_prescription(id, rx_no, fields, created_at, updated_at)
    }
}

#[cfg(any(feature = "sqlite", test))]
impl TryFrom<SqliteRow> for Prescription {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let get = |name: &str| -> DbResult<String> {
            row.try_get(name).map_err(sqlite::map_sqlx_error)
        };
        let fields = PrescriptionFields::new(
            get("paciente")?,
            get("endereco")?,
            get("idade")?,
            get("data")?,
            get("diag")?,
            get("presc")?,
        );

        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let rx_no: String = row.try_get("rx_no").map_err(sqlite::map_sqlx_error)?;
        let created_at: i64 = row.try_get("created_at").map_err(sqlite::map_sqlx_error)?;
        let updated_at: i64 = row.try_get("updated_at").map_err(sqlite::map_sqlx_error)?;

        build_prescription(id, rx_no, fields, created_at, updated_at)
    }
}

/// Gets the last number issued by the counter, or zero if the counter has never been set up.
pub(crate) async fn get_counter(ex: &mut Executor) -> DbResult<SequenceNumber> {
    let query_str = "SELECT last_number FROM counter WHERE id = 1";
    let last: Option<i64> = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let row = sqlx::query(query_str)
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            match row {
                Some(row) => Some(row.try_get("last_number").map_err(postgres::map_sqlx_error)?),
                None => None,
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let row = sqlx::query(query_str)
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            match row {
                Some(row) => Some(row.try_get("last_number").map_err(sqlite::map_sqlx_error)?),
                None => None,
            }
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    match last {
        Some(last) => Ok(SequenceNumber::from_i64(last)?),
        None => Ok(SequenceNumber::default()),
    }
}

/// Atomically increments the counter and returns the new value.  A missing counter row is
/// treated as zero and is created.
///
/// This is a single read-modify-write statement so, when issued as the first statement of a
/// transaction, the transaction acquires the write lock on the counter before observing its
/// value.  Concurrent callers are thus serialized by the database and can never observe the same
/// value, as long as the caller commits or rolls back the transaction as a whole.
pub(crate) async fn advance_counter(ex: &mut Executor) -> DbResult<SequenceNumber> {
    let query_str = "
        INSERT INTO counter (id, last_number) VALUES (1, 1)
        ON CONFLICT (id) DO UPDATE SET last_number = counter.last_number + 1
        RETURNING last_number";
    let next: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let row = sqlx::query(query_str)
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("last_number").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let row = sqlx::query(query_str)
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("last_number").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(SequenceNumber::from_i64(next)?)
}

/// Inserts a new prescription numbered `rx_no` with `fields`, created and updated at `now`.
///
/// Fails with `AlreadyExists` if `rx_no` is already taken.
pub(crate) async fn put_prescription(
    ex: &mut Executor,
    rx_no: RxNo,
    fields: PrescriptionFields,
    now: Timestamp,
) -> DbResult<Prescription> {
    let id: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                INSERT INTO prescriptions
                    (rx_no, paciente, endereco, idade, data, diag, presc, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(rx_no.as_str())
                .bind(fields.paciente())
                .bind(fields.endereco())
                .bind(fields.idade())
                .bind(fields.data())
                .bind(fields.diag())
                .bind(fields.presc())
                .bind(now.as_millis())
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                INSERT INTO prescriptions
                    (rx_no, paciente, endereco, idade, data, diag, presc, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(rx_no.as_str())
                .bind(fields.paciente())
                .bind(fields.endereco())
                .bind(fields.idade())
                .bind(fields.data())
                .bind(fields.diag())
                .bind(fields.presc())
                .bind(now.as_millis())
                .bind(now.as_millis())
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("id").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Prescription::new(PrescriptionId::new(id), rx_no, fields, now, now))
}

/// Gets the prescription identified by `id`.
pub(crate) async fn get_prescription(
    ex: &mut Executor,
    id: PrescriptionId,
) -> DbResult<Prescription> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT * FROM prescriptions WHERE id = $1";
            let raw = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            Prescription::try_from(raw)
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT * FROM prescriptions WHERE id = ?";
            let raw = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Prescription::try_from(raw)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets all prescriptions, newest first.  Prescriptions created at the same time are returned
/// in reverse insertion order.
pub(crate) async fn list_prescriptions(ex: &mut Executor) -> DbResult<Vec<Prescription>> {
    let query_str = "SELECT * FROM prescriptions ORDER BY created_at DESC, id DESC";
    let mut prescriptions = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                prescriptions.push(Prescription::try_from(row)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                prescriptions.push(Prescription::try_from(row)?);
            }
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
    Ok(prescriptions)
}

/// Replaces all mutable `fields` of the prescription identified by `id` and marks it as updated
/// at `now`, or at its creation time if `now` is earlier.
pub(crate) async fn update_prescription(
    ex: &mut Executor,
    id: PrescriptionId,
    fields: &PrescriptionFields,
    now: Timestamp,
) -> DbResult<Prescription> {
    let raw = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                UPDATE prescriptions SET
                    paciente = $1, endereco = $2, idade = $3, data = $4, diag = $5, presc = $6,
                    updated_at = GREATEST(created_at, $7)
                WHERE id = $8
                RETURNING *";
            let raw = sqlx::query(query_str)
                .bind(fields.paciente())
                .bind(fields.endereco())
                .bind(fields.idade())
                .bind(fields.data())
                .bind(fields.diag())
                .bind(fields.presc())
                .bind(now.as_millis())
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            match raw {
                Some(raw) => Some(Prescription::try_from(raw)?),
                None => None,
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                UPDATE prescriptions SET
                    paciente = ?, endereco = ?, idade = ?, data = ?, diag = ?, presc = ?,
                    updated_at = MAX(created_at, ?)
                WHERE id = ?
                RETURNING *";
            let raw = sqlx::query(query_str)
                .bind(fields.paciente())
                .bind(fields.endereco())
                .bind(fields.idade())
                .bind(fields.data())
                .bind(fields.diag())
                .bind(fields.presc())
                .bind(now.as_millis())
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            match raw {
                Some(raw) => Some(Prescription::try_from(raw)?),
                None => None,
            }
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    raw.ok_or(DbError::NotFound)
}

/// Deletes the prescription identified by `id`.
pub(crate) async fn delete_prescription(ex: &mut Executor, id: PrescriptionId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "DELETE FROM prescriptions WHERE id = $1";
            let done = sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "DELETE FROM prescriptions WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}
