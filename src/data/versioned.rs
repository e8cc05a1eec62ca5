//! Optimistic concurrency control for mutable records.
//!
//! Every record carries a version that starts at 1 and grows by exactly one per
//! successful update. An update names the version the caller last observed and
//! only lands if the stored row still has it. The check and the write happen
//! under the same shard lock, so no lock is held between a caller's read and
//! its write, and racing updaters on one id see exactly one winner per version.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// A stored record plus its identity and version stamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
    pub version: i32,
}

/// A table of versioned records with conditioned writes.
#[derive(Debug)]
pub struct VersionedTable<T> {
    rows: DashMap<i64, Versioned<T>>,
    next_id: AtomicI64,
}

impl<T> Default for VersionedTable<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl<T: Clone> VersionedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under a fresh id at version 1.
    pub fn insert(&self, data: T) -> Versioned<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Versioned {
            id,
            created_at: Utc::now(),
            data,
            version: 1,
        };
        self.rows.insert(id, record.clone());
        record
    }

    pub fn get(&self, id: i64) -> AppResult<Versioned<T>> {
        self.rows
            .get(&id)
            .map(|row| row.value().clone())
            .ok_or(AppError::RecordNotFound)
    }

    /// Write `record.data` if the stored row still has `record.version`.
    ///
    /// On success the stored version and `record.version` both move to the new
    /// version, which is also returned. A stale version or a missing row is an
    /// [`AppError::EditConflict`].
    pub fn update(&self, record: &mut Versioned<T>) -> AppResult<i32> {
        let mut row = self.rows.get_mut(&record.id).ok_or(AppError::EditConflict)?;
        if row.version != record.version {
            return Err(AppError::EditConflict);
        }

        row.data = record.data.clone();
        row.version += 1;
        record.version = row.version;
        Ok(row.version)
    }

    pub fn delete(&self, id: i64) -> AppResult<()> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::RecordNotFound)
    }

    /// Every row matching `predicate`, ordered by id.
    pub fn select(&self, predicate: impl Fn(&Versioned<T>) -> bool) -> Vec<Versioned<T>> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .filter(|row| predicate(row.value()))
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn insert_starts_at_version_one() {
        let table = VersionedTable::new();
        let first = table.insert("a");
        let second = table.insert("b");
        assert_eq!(first.version, 1);
        assert_eq!(second.id, first.id + 1);
    }

    #[test]
    fn current_version_update_increments_by_one() {
        let table = VersionedTable::new();
        let mut record = table.insert(String::from("draft"));

        record.data = String::from("final");
        assert_eq!(table.update(&mut record).unwrap(), 2);
        assert_eq!(record.version, 2);

        let stored = table.get(record.id).unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.data, "final");
    }

    #[test]
    fn stale_version_is_an_edit_conflict() {
        let table = VersionedTable::new();
        let mut first_reader = table.insert(10);
        let mut second_reader = first_reader.clone();

        first_reader.data = 11;
        table.update(&mut first_reader).unwrap();

        second_reader.data = 12;
        assert!(matches!(table.update(&mut second_reader), Err(AppError::EditConflict)));
        assert_eq!(table.get(first_reader.id).unwrap().data, 11);
    }

    #[test]
    fn missing_row_is_an_edit_conflict_but_get_is_not_found() {
        let table = VersionedTable::new();
        let mut record = table.insert(1);
        table.delete(record.id).unwrap();

        assert!(matches!(table.update(&mut record), Err(AppError::EditConflict)));
        assert!(matches!(table.get(record.id), Err(AppError::RecordNotFound)));
        assert!(matches!(table.delete(record.id), Err(AppError::RecordNotFound)));
    }

    #[test]
    fn racing_updaters_see_exactly_one_winner() {
        let table = Arc::new(VersionedTable::new());
        let record = table.insert(0_u32);
        let barrier = Arc::new(Barrier::new(64));

        let handles: Vec<_> = (0..64_u32)
            .map(|n| {
                let table = table.clone();
                let barrier = barrier.clone();
                let mut copy = record.clone();
                thread::spawn(move || {
                    copy.data = n;
                    barrier.wait();
                    table.update(&mut copy).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(table.get(record.id).unwrap().version, 2);
    }

    #[test]
    fn select_orders_by_id() {
        let table = VersionedTable::new();
        for n in 0..10 {
            table.insert(n);
        }
        let odd = table.select(|row| row.data % 2 == 1);
        let ids: Vec<_> = odd.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![2, 4, 6, 8, 10]);
    }
}
