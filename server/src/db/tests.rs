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

//! Database tests shared by all implementations.

use crate::db::*;
use receituario_core::db::Db;

/// Runs a raw `query` against `ex`, which must be valid for all database implementations.
async fn exec(ex: &mut Executor, query: &str) {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            sqlx::query(query).execute(ex.conn()).await.unwrap();
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            sqlx::query(query).execute(ex.conn()).await.unwrap();
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Syntactic sugar to create a timestamp from milliseconds.
fn ts(ms: i64) -> Timestamp {
    Timestamp::from_millis(ms).unwrap()
}

/// Syntactic sugar to insert a prescription for `paciente` numbered `rx_no` at `created_ms`.
async fn put_simple(
    ex: &mut Executor,
    rx_no: &'static str,
    paciente: &'static str,
    created_ms: i64,
) -> Prescription {
    put_prescription(
        ex,
        RxNo::new(rx_no).unwrap(),
        PrescriptionFields::default().with_paciente(paciente),
        ts(created_ms),
    )
    .await
    .unwrap()
}

pub(super) async fn test_counter_starts_at_zero(db: Box<dyn Db>) {
    assert_eq!(SequenceNumber::default(), get_counter(&mut db.ex().await.unwrap()).await.unwrap());
    db.close().await;
}

pub(super) async fn test_counter_schema_init_is_idempotent(db: Box<dyn Db>) {
    let mut tx = db.begin().await.unwrap();
    advance_counter(tx.ex()).await.unwrap();
    tx.commit().await.unwrap();

    init_schema(&mut db.ex().await.unwrap()).await.unwrap();

    assert_eq!(
        SequenceNumber::from_i64(1).unwrap(),
        get_counter(&mut db.ex().await.unwrap()).await.unwrap()
    );
    db.close().await;
}

pub(super) async fn test_counter_advance_sequence(db: Box<dyn Db>) {
    for i in 1..=3 {
        let mut tx = db.begin().await.unwrap();
        let next = advance_counter(tx.ex()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(SequenceNumber::from_i64(i).unwrap(), next);
    }

    assert_eq!(
        SequenceNumber::from_i64(3).unwrap(),
        get_counter(&mut db.ex().await.unwrap()).await.unwrap()
    );
    db.close().await;
}

pub(super) async fn test_counter_advance_rollback(db: Box<dyn Db>) {
    let mut tx = db.begin().await.unwrap();
    assert_eq!(SequenceNumber::from_i64(1).unwrap(), advance_counter(tx.ex()).await.unwrap());
    tx.rollback().await.unwrap();

    assert_eq!(SequenceNumber::default(), get_counter(&mut db.ex().await.unwrap()).await.unwrap());
    db.close().await;
}

pub(super) async fn test_counter_missing_row(db: Box<dyn Db>) {
    exec(&mut db.ex().await.unwrap(), "DELETE FROM counter").await;

    assert_eq!(SequenceNumber::default(), get_counter(&mut db.ex().await.unwrap()).await.unwrap());

    let mut tx = db.begin().await.unwrap();
    assert_eq!(SequenceNumber::from_i64(1).unwrap(), advance_counter(tx.ex()).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(
        SequenceNumber::from_i64(1).unwrap(),
        get_counter(&mut db.ex().await.unwrap()).await.unwrap()
    );
    db.close().await;
}

pub(super) async fn test_prescription_put_get(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    let fields = PrescriptionFields::new(
        "Ana Silva".to_owned(),
        "Rua A, 1".to_owned(),
        "34".to_owned(),
        "2024-03-01".to_owned(),
        "Gripe".to_owned(),
        "Repouso".to_owned(),
    );
    let created =
        put_prescription(&mut ex, RxNo::new("000001").unwrap(), fields.clone(), ts(1000))
            .await
            .unwrap();
    assert_eq!("000001", created.rx_no().as_str());
    assert_eq!(&fields, created.fields());
    assert_eq!(ts(1000), *created.created_at());
    assert_eq!(ts(1000), *created.updated_at());

    assert_eq!(created, get_prescription(&mut ex, *created.id()).await.unwrap());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_get_not_found(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    put_simple(&mut ex, "000001", "Ana", 1000).await;

    assert_eq!(
        DbError::NotFound,
        get_prescription(&mut ex, PrescriptionId::new(999)).await.unwrap_err()
    );

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_duplicate_rx_no(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    put_simple(&mut ex, "000001", "Ana", 1000).await;
    assert_eq!(
        DbError::AlreadyExists,
        put_prescription(
            &mut ex,
            RxNo::new("000001").unwrap(),
            PrescriptionFields::default(),
            ts(2000)
        )
        .await
        .unwrap_err()
    );
    assert_eq!(1, list_prescriptions(&mut ex).await.unwrap().len());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_list_order(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    assert!(list_prescriptions(&mut ex).await.unwrap().is_empty());

    let p1 = put_simple(&mut ex, "000001", "first", 1000).await;
    let p2 = put_simple(&mut ex, "000002", "second", 3000).await;
    let p3 = put_simple(&mut ex, "000003", "third", 2000).await;
    let p4 = put_simple(&mut ex, "000004", "fourth", 3000).await;

    let list = list_prescriptions(&mut ex).await.unwrap();
    assert_eq!(vec![p4, p2, p3, p1], list);
    assert_eq!(list, list_prescriptions(&mut ex).await.unwrap());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_update_ok(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    let created = put_simple(&mut ex, "000001", "Ana", 1000).await;
    let other = put_simple(&mut ex, "000002", "Bia", 1000).await;

    let fields = PrescriptionFields::default().with_diag("Gripe");
    let updated = update_prescription(&mut ex, *created.id(), &fields, ts(5000)).await.unwrap();
    assert_eq!(created.id(), updated.id());
    assert_eq!(created.rx_no(), updated.rx_no());
    assert_eq!(created.created_at(), updated.created_at());
    assert_eq!(&fields, updated.fields());
    assert_eq!(ts(5000), *updated.updated_at());

    assert_eq!(updated, get_prescription(&mut ex, *created.id()).await.unwrap());
    assert_eq!(other, get_prescription(&mut ex, *other.id()).await.unwrap());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_update_before_creation(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    let created = put_simple(&mut ex, "000001", "Ana", 5000).await;

    let fields = PrescriptionFields::default().with_paciente("Ana Maria");
    let updated = update_prescription(&mut ex, *created.id(), &fields, ts(1000)).await.unwrap();
    assert_eq!(ts(5000), *updated.updated_at());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_update_not_found(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    let created = put_simple(&mut ex, "000001", "Ana", 1000).await;

    assert_eq!(
        DbError::NotFound,
        update_prescription(
            &mut ex,
            PrescriptionId::new(created.id().as_i64() + 1),
            &PrescriptionFields::default(),
            ts(2000)
        )
        .await
        .unwrap_err()
    );
    assert_eq!(vec![created], list_prescriptions(&mut ex).await.unwrap());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_delete(db: Box<dyn Db>) {
    let mut ex = db.ex().await.unwrap();

    let p1 = put_simple(&mut ex, "000001", "Ana", 1000).await;
    let p2 = put_simple(&mut ex, "000002", "Bia", 2000).await;

    delete_prescription(&mut ex, *p1.id()).await.unwrap();
    assert_eq!(DbError::NotFound, get_prescription(&mut ex, *p1.id()).await.unwrap_err());
    assert_eq!(vec![p2.clone()], list_prescriptions(&mut ex).await.unwrap());

    assert_eq!(DbError::NotFound, delete_prescription(&mut ex, *p1.id()).await.unwrap_err());
    assert_eq!(vec![p2], list_prescriptions(&mut ex).await.unwrap());

    drop(ex);
    db.close().await;
}

pub(super) async fn test_prescription_rollback_with_counter(db: Box<dyn Db>) {
    {
        let mut tx = db.begin().await.unwrap();
        let next = advance_counter(tx.ex()).await.unwrap();
        put_prescription(tx.ex(), RxNo::from(next), PrescriptionFields::default(), ts(1000))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
    }

    let mut ex = db.ex().await.unwrap();
    assert_eq!(SequenceNumber::default(), get_counter(&mut ex).await.unwrap());
    assert!(list_prescriptions(&mut ex).await.unwrap().is_empty());

    drop(ex);
    db.close().await;
}

macro_rules! generate_db_tests [
    ( $setup:expr $(, #[$extra:meta] )? ) => {
        receituario_core::db::testutils::generate_tests!(
            $(#[$extra],)?
            $setup,
            $crate::db::tests,
            test_counter_starts_at_zero,
            test_counter_schema_init_is_idempotent,
            test_counter_advance_sequence,
            test_counter_advance_rollback,
            test_counter_missing_row,
            test_prescription_put_get,
            test_prescription_get_not_found,
            test_prescription_duplicate_rx_no,
            test_prescription_list_order,
            test_prescription_update_ok,
            test_prescription_update_before_creation,
            test_prescription_update_not_found,
            test_prescription_delete,
            test_prescription_rollback_with_counter
        );
    }
];

mod sqlite {
    use super::*;
    use receituario_core::db::sqlite::testutils::setup;

    /// Connects to an in-memory database and initializes it with the schema.
    async fn setup_with_schema() -> Box<dyn Db> {
        let db = setup().await;
        init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        Box::new(db)
    }

    generate_db_tests!(setup_with_schema().await);
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use receituario_core::db::postgres::testutils::setup;

    /// Connects to the test database and initializes it with the schema.
    async fn setup_with_schema() -> Box<dyn Db> {
        let db = setup().await;
        init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        Box::new(db)
    }

    generate_db_tests!(
        setup_with_schema().await,
        #[ignore = "Requires environment configuration and is expensive"]
    );
}
