//! Record storage: append to, load, and verify an item's record chain.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{Address, ItemId, RecordHash, State, TrackingRecord};

use super::item::{decode_address, decode_hash, decode_state, id_param, load_item, to_u64};
use super::{Result, Storage, StorageError};

/// Outcome of a successful chain check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verified {
    /// Number of records checked.
    pub records: u64,
    /// Hash of the newest record, or [`RecordHash::GENESIS`] for an empty chain.
    pub head: RecordHash,
}

impl Storage {
    /// Loads an item's tracking records, oldest first.
    ///
    /// An id that was never assigned has an empty history.
    pub fn history(&self, id: ItemId) -> Result<Vec<TrackingRecord>> {
        let Ok(item_id) = id_param(id) else {
            return Ok(Vec::new());
        };
        let conn = self.reader()?;
        load_history(&conn, item_id)
    }

    /// Recomputes an item's record chain and checks it against the item row.
    ///
    /// The item and its records are read in one snapshot. Fails with
    /// [`StorageError::Tampered`] at the first record whose stored hashes
    /// don't match its contents or its predecessor, or at the newest record
    /// when the item's current state or owner disagrees with it. An id with
    /// neither an item nor records verifies as an empty chain.
    pub fn verify(&self, id: ItemId) -> Result<Verified> {
        let Ok(item_id) = id_param(id) else {
            return Ok(Verified {
                records: 0,
                head: RecordHash::GENESIS,
            });
        };
        let mut conn = self.reader()?;
        let tx = conn.transaction()?;
        let item = load_item(&tx, id)?;
        let records = load_history(&tx, item_id)?;
        drop(tx);

        let tampered = |position: u64, details: &str| StorageError::Tampered {
            item: id,
            position,
            details: details.to_string(),
        };

        let mut expected_prev = RecordHash::GENESIS;
        let mut previous: Option<&TrackingRecord> = None;
        let mut position = 0u64;

        for record in &records {
            if record.prev_hash != expected_prev {
                return Err(tampered(position, "prev_hash mismatch"));
            }
            let computed = RecordHash::compute(
                &expected_prev,
                id,
                position,
                record.state,
                &record.actor,
                &record.owner,
                record.timestamp,
            );
            if computed != record.hash {
                return Err(tampered(position, "record_hash mismatch"));
            }
            let expected_state = match previous {
                None => Some(State::Harvested),
                Some(prev) => prev.state.next(),
            };
            if expected_state != Some(record.state) {
                return Err(tampered(position, "state out of lifecycle order"));
            }
            let expected_owner = match previous {
                None => record.actor,
                Some(_) if record.state == State::Shipped => record.owner,
                Some(prev) => prev.owner,
            };
            if record.owner != expected_owner {
                return Err(tampered(position, "owner changed outside shipping"));
            }
            if previous.is_some_and(|prev| record.timestamp < prev.timestamp) {
                return Err(tampered(position, "timestamp went backwards"));
            }

            expected_prev = record.hash;
            previous = Some(record);
            position += 1;
        }

        match (item, previous) {
            (None, None) => {}
            (None, Some(_)) => return Err(tampered(0, "records for an item that does not exist")),
            (Some(_), None) => return Err(tampered(0, "item has no records")),
            (Some(item), Some(last)) => {
                let newest = position - 1;
                if item.current_state != last.state {
                    return Err(tampered(newest, "item state differs from newest record"));
                }
                if item.owner != last.owner {
                    return Err(tampered(newest, "item owner differs from newest record"));
                }
            }
        }

        Ok(Verified {
            records: position,
            head: expected_prev,
        })
    }
}

fn load_history(conn: &Connection, item_id: i64) -> Result<Vec<TrackingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT state, actor, owner, timestamp, prev_hash, record_hash
         FROM records WHERE item_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![item_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Vec<u8>>(1)?,
            row.get::<_, Vec<u8>>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Vec<u8>>(4)?,
            row.get::<_, Vec<u8>>(5)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (state, actor, owner, timestamp, prev_hash, hash) = row?;
        records.push(TrackingRecord {
            state: decode_state(state)?,
            actor: decode_address(&actor)?,
            owner: decode_address(&owner)?,
            timestamp: decode_timestamp(timestamp)?,
            prev_hash: decode_hash(&prev_hash, "prev_hash")?,
            hash: decode_hash(&hash, "record_hash")?,
        });
    }
    Ok(records)
}

/// Appends the next record to an item's chain. Runs inside the caller's transaction.
///
/// The timestamp is truncated to whole seconds and never earlier than the
/// item's previous record.
pub(super) fn insert_record(
    conn: &Connection,
    id: ItemId,
    state: State,
    actor: Address,
    owner: Address,
    at: Timestamp,
) -> Result<TrackingRecord> {
    let item_id = id_param(id)?;
    let last = conn
        .query_row(
            "SELECT position, timestamp, record_hash FROM records
             WHERE item_id = ?1 ORDER BY position DESC LIMIT 1",
            params![item_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            },
        )
        .optional()?;

    let mut seconds = at.as_second();
    let (position, prev_hash) = match last {
        Some((position, last_seconds, hash)) => {
            seconds = seconds.max(last_seconds);
            (
                to_u64(position, "position")? + 1,
                decode_hash(&hash, "record_hash")?,
            )
        }
        None => (0, RecordHash::GENESIS),
    };
    let timestamp = decode_timestamp(seconds)?;
    let hash = RecordHash::compute(&prev_hash, id, position, state, &actor, &owner, timestamp);

    conn.execute(
        "INSERT INTO records
             (item_id, position, state, actor, owner, timestamp, prev_hash, record_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            item_id,
            i64::try_from(position)
                .map_err(|_| StorageError::Corrupt(format!("position overflow: {position}")))?,
            state.code(),
            actor.as_bytes().as_slice(),
            owner.as_bytes().as_slice(),
            seconds,
            prev_hash.0.as_slice(),
            hash.0.as_slice(),
        ],
    )?;

    Ok(TrackingRecord {
        state,
        actor,
        owner,
        timestamp,
        prev_hash,
        hash,
    })
}

fn decode_timestamp(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds)
        .map_err(|e| StorageError::Corrupt(format!("invalid timestamp {seconds}: {e}")))
}
