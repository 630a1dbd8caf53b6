//! Item storage: allocate, load, list, and advance items.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::model::{Address, Item, ItemId, RecordHash, State, TrackingRecord};

use super::{Result, Storage, StorageError, history};

impl Storage {
    /// Creates a new `Harvested` item owned by `creator` and writes its first record.
    ///
    /// Ids are assigned sequentially from 1 and never reused.
    pub fn allocate(
        &self,
        name: &str,
        creator: Address,
        at: Timestamp,
    ) -> Result<(Item, TrackingRecord)> {
        let mut conn = self.writer()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO items (name, owner, state) VALUES (?1, ?2, ?3)",
            params![name, creator.as_bytes().as_slice(), State::Harvested.code()],
        )?;
        let id = ItemId(to_u64(tx.last_insert_rowid(), "item id")?);

        let record = history::insert_record(&tx, id, State::Harvested, creator, creator, at)?;
        tx.commit()?;

        tracing::debug!(item = %id, name, "allocated item");

        let item = Item {
            id,
            name: name.to_string(),
            owner: creator,
            current_state: State::Harvested,
        };
        Ok((item, record))
    }

    /// Loads an item's current state.
    pub fn get(&self, id: ItemId) -> Result<Item> {
        if id.is_none() {
            return Err(StorageError::ItemNotFound(id));
        }
        let conn = self.reader()?;
        load_item(&conn, id)?.ok_or(StorageError::ItemNotFound(id))
    }

    /// Lists every item in id order.
    pub fn list(&self) -> Result<Vec<Item>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare("SELECT id, name, owner, state FROM items ORDER BY id")?;
        let rows = stmt.query_map([], read_item_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(decode_item(row?)?);
        }
        Ok(items)
    }

    /// Moves an item from `from` to `to` and appends the matching record, atomically.
    ///
    /// This is a compare-and-set: it only applies while the stored state is
    /// still `from`. Returns `None` when the item has moved on, in which case
    /// nothing was written. `new_owner` replaces the owner when given.
    ///
    /// `to` must be the stage directly after `from`; anything else fails with
    /// [`StorageError::IllegalTransition`] before the database is touched.
    pub fn advance(
        &self,
        id: ItemId,
        from: State,
        to: State,
        actor: Address,
        new_owner: Option<Address>,
        at: Timestamp,
    ) -> Result<Option<TrackingRecord>> {
        if from.next() != Some(to) {
            return Err(StorageError::IllegalTransition { item: id, from, to });
        }
        if id.is_none() {
            return Err(StorageError::ItemNotFound(id));
        }
        let mut conn = self.writer()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = match new_owner {
            Some(owner) => tx.execute(
                "UPDATE items SET state = ?1, owner = ?2 WHERE id = ?3 AND state = ?4",
                params![to.code(), owner.as_bytes().as_slice(), id_param(id)?, from.code()],
            )?,
            None => tx.execute(
                "UPDATE items SET state = ?1 WHERE id = ?2 AND state = ?3",
                params![to.code(), id_param(id)?, from.code()],
            )?,
        };

        if changed == 0 {
            // Either the item doesn't exist or another writer got there first.
            if load_item(&tx, id)?.is_none() {
                return Err(StorageError::ItemNotFound(id));
            }
            return Ok(None);
        }

        let owner = match new_owner {
            Some(owner) => owner,
            None => load_item(&tx, id)?.ok_or(StorageError::ItemNotFound(id))?.owner,
        };
        let record = history::insert_record(&tx, id, to, actor, owner, at)?;
        tx.commit()?;

        tracing::debug!(item = %id, ?from, ?to, %actor, "advanced item");
        Ok(Some(record))
    }
}

type ItemRow = (i64, String, Vec<u8>, i64);

fn read_item_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

pub(super) fn load_item(conn: &Connection, id: ItemId) -> Result<Option<Item>> {
    let row = conn
        .query_row(
            "SELECT id, name, owner, state FROM items WHERE id = ?1",
            params![id_param(id)?],
            read_item_row,
        )
        .optional()?;
    row.map(decode_item).transpose()
}

fn decode_item((id, name, owner, state): ItemRow) -> Result<Item> {
    Ok(Item {
        id: ItemId(to_u64(id, "item id")?),
        name,
        owner: decode_address(&owner)?,
        current_state: decode_state(state)?,
    })
}

pub(super) fn decode_address(bytes: &[u8]) -> Result<Address> {
    <[u8; crate::model::ADDRESS_LEN]>::try_from(bytes)
        .map(Address::new)
        .map_err(|_| StorageError::Corrupt(format!("address of {} bytes", bytes.len())))
}

pub(super) fn decode_state(code: i64) -> Result<State> {
    u8::try_from(code)
        .ok()
        .and_then(State::from_code)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown state code: {code}")))
}

pub(super) fn decode_hash(bytes: &[u8], column: &str) -> Result<RecordHash> {
    RecordHash::from_slice(bytes)
        .ok_or_else(|| StorageError::Corrupt(format!("{column} of {} bytes", bytes.len())))
}

pub(super) fn to_u64(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| StorageError::Corrupt(format!("negative {what}: {value}")))
}

/// SQLite integers are signed; ids beyond `i64::MAX` can never have been assigned.
pub(super) fn id_param(id: ItemId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| StorageError::ItemNotFound(id))
}
