//! Tracking records: the immutable audit trail of an item's transitions.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::{Address, ItemId, State};

/// One applied transition. Never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    /// The state entered by this transition.
    pub state: State,
    /// Who performed it.
    pub actor: Address,
    /// Custodian once this transition applied. Differs from the previous
    /// record's owner only on shipping.
    pub owner: Address,
    /// When, to the second.
    pub timestamp: Timestamp,
    /// Hash of the item's previous record, or [`RecordHash::GENESIS`] for the first.
    pub prev_hash: RecordHash,
    /// Hash of this record, chained over `prev_hash`.
    pub hash: RecordHash,
}

/// SHA-256 link in an item's record chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHash(pub [u8; 32]);

impl RecordHash {
    /// Stands in for the previous hash of an item's first record.
    pub const GENESIS: Self = Self([0; 32]);

    /// Hashes one record's contents together with its predecessor's hash.
    ///
    /// `position` is the record's zero-based index in the item's history.
    pub fn compute(
        prev: &Self,
        item_id: ItemId,
        position: u64,
        state: State,
        actor: &Address,
        owner: &Address,
        timestamp: Timestamp,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(prev.0);
        hasher.update(item_id.0.to_be_bytes());
        hasher.update(position.to_be_bytes());
        hasher.update([state.code()]);
        hasher.update(actor.as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(timestamp.as_second().to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }
}

impl fmt::Debug for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordHash({self})")
    }
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for RecordHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Emitted once per successful transition, for anyone watching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub item_id: ItemId,
    pub new_state: State,
    pub actor: Address,
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_second(secs).unwrap()
    }

    #[test]
    fn hash_depends_on_every_field() {
        let actor = Address::new([1; 20]);
        let other = Address::new([2; 20]);
        let hash =
            |prev: &RecordHash, id, position, state, actor: &Address, owner: &Address, secs| {
                RecordHash::compute(prev, ItemId(id), position, state, actor, owner, ts(secs))
            };
        let genesis = RecordHash::GENESIS;
        let base = hash(&genesis, 1, 0, State::Harvested, &actor, &actor, 100);

        let variants = [
            hash(&base, 1, 0, State::Harvested, &actor, &actor, 100),
            hash(&genesis, 2, 0, State::Harvested, &actor, &actor, 100),
            hash(&genesis, 1, 1, State::Harvested, &actor, &actor, 100),
            hash(&genesis, 1, 0, State::Processed, &actor, &actor, 100),
            hash(&genesis, 1, 0, State::Harvested, &other, &actor, 100),
            hash(&genesis, 1, 0, State::Harvested, &actor, &other, 100),
            hash(&genesis, 1, 0, State::Harvested, &actor, &actor, 101),
        ];
        for v in variants {
            assert_ne!(v, base);
        }
    }

    #[test]
    fn hash_serializes_as_hex() {
        let h = RecordHash([0xab; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: RecordHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
