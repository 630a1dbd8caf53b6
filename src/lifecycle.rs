//! Lifecycle control: the only way items move through their stages.
//!
//! ```text
//! Harvested --process--> Processed --ship--> Shipped --receive--> Received
//! ```
//!
//! Every command names its acting address explicitly. A command either
//! succeeds (state moved, one record appended, one event emitted) or fails
//! before anything is written.

mod events;

use std::sync::mpsc::Receiver;
use std::sync::{Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;

use crate::model::{Address, Item, ItemId, State, TrackingRecord, TransitionEvent};
use crate::storage::{Storage, StorageError, Verified};

use events::Subscribers;

/// Why a lifecycle command or query failed.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("item {item} is {current:?}; cannot move to {target:?}")]
    InvalidState {
        item: ItemId,
        current: State,
        target: State,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("item {item} history tampered at record {position}: {details}")]
    Tampered {
        item: ItemId,
        position: u64,
        details: String,
    },

    #[error("storage failure: {0}")]
    Fatal(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ItemNotFound(id) => Self::NotFound(id),
            StorageError::IllegalTransition { item, from, to } => Self::InvalidState {
                item,
                current: from,
                target: to,
            },
            StorageError::Tampered {
                item,
                position,
                details,
            } => Self::Tampered {
                item,
                position,
                details,
            },
            other => Self::Fatal(other),
        }
    }
}

pub type Result<T> = core::result::Result<T, LedgerError>;

/// Source of transition times.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Applies lifecycle commands against a ledger store.
///
/// Events reach subscribers in the order their records were committed.
pub struct Lifecycle<'a, C = SystemClock> {
    storage: &'a Storage,
    clock: C,
    subscribers: Subscribers,
    /// Held from a write until its event is published.
    commit_order: Mutex<()>,
}

impl<'a> Lifecycle<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<'a, C: Clock> Lifecycle<'a, C> {
    pub fn with_clock(storage: &'a Storage, clock: C) -> Self {
        Self {
            storage,
            clock,
            subscribers: Subscribers::default(),
            commit_order: Mutex::new(()),
        }
    }

    /// Receives one [`TransitionEvent`] per successful command from now on.
    pub fn subscribe(&self) -> Receiver<TransitionEvent> {
        self.subscribers.subscribe()
    }

    // ── Commands ──

    /// Registers a newly harvested item owned by `actor`.
    pub fn harvest(&self, actor: Address, name: &str) -> Result<ItemId> {
        require_actor(actor)?;
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("item name is empty".into()));
        }

        let _order = self.commit_order();
        let (item, record) = self.storage.allocate(name, actor, self.clock.now())?;
        self.emit(item.id, &record);
        Ok(item.id)
    }

    /// Marks a harvested item as processed.
    pub fn process(&self, actor: Address, id: ItemId) -> Result<()> {
        self.transition(actor, id, State::Processed, None)
    }

    /// Hands a processed item to `new_owner` and marks it shipped.
    pub fn ship(&self, actor: Address, id: ItemId, new_owner: Address) -> Result<()> {
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidInput(
                "recipient must not be the zero address".into(),
            ));
        }
        self.transition(actor, id, State::Shipped, Some(new_owner))
    }

    /// Marks a shipped item as received.
    pub fn receive(&self, actor: Address, id: ItemId) -> Result<()> {
        self.transition(actor, id, State::Received, None)
    }

    // ── Queries ──

    pub fn get(&self, id: ItemId) -> Result<Item> {
        Ok(self.storage.get(id)?)
    }

    /// Oldest first; empty for an id that was never assigned.
    pub fn history(&self, id: ItemId) -> Result<Vec<TrackingRecord>> {
        Ok(self.storage.history(id)?)
    }

    pub fn list(&self) -> Result<Vec<Item>> {
        Ok(self.storage.list()?)
    }

    pub fn verify(&self, id: ItemId) -> Result<Verified> {
        Ok(self.storage.verify(id)?)
    }

    /// Validates, then commits a single forward step into `target`.
    fn transition(
        &self,
        actor: Address,
        id: ItemId,
        target: State,
        new_owner: Option<Address>,
    ) -> Result<()> {
        require_actor(actor)?;
        let Some(from) = target.prerequisite() else {
            return Err(LedgerError::InvalidInput(format!(
                "{target:?} is only entered by harvesting"
            )));
        };

        let item = self.storage.get(id)?;
        if item.current_state != from {
            tracing::warn!(item = %id, current = ?item.current_state, ?target, "rejected transition");
            return Err(LedgerError::InvalidState {
                item: id,
                current: item.current_state,
                target,
            });
        }

        let order = self.commit_order();
        let applied = self
            .storage
            .advance(id, from, target, actor, new_owner, self.clock.now())?;
        let Some(record) = applied else {
            drop(order);
            // Lost a race: someone else moved the item after we read it.
            let current = self.storage.get(id)?.current_state;
            tracing::warn!(item = %id, ?current, ?target, "transition lost to concurrent writer");
            return Err(LedgerError::InvalidState {
                item: id,
                current,
                target,
            });
        };

        self.emit(id, &record);
        Ok(())
    }

    fn commit_order(&self) -> MutexGuard<'_, ()> {
        self.commit_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, id: ItemId, record: &TrackingRecord) {
        let event = TransitionEvent {
            item_id: id,
            new_state: record.state,
            actor: record.actor,
            timestamp: record.timestamp,
        };
        tracing::info!(
            item = %event.item_id,
            state = ?event.new_state,
            actor = %event.actor,
            timestamp = %event.timestamp,
            "item transitioned"
        );
        self.subscribers.publish(&event);
    }
}

fn require_actor(actor: Address) -> Result<()> {
    if actor.is_zero() {
        return Err(LedgerError::InvalidInput(
            "acting identity must not be the zero address".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::sync::atomic::{AtomicI64, Ordering};

    use crate::storage::tests::test_storage;

    const FARMER: Address = Address::new([0xfa; 20]);
    const PROCESSOR: Address = Address::new([0xbe; 20]);
    const ADDR_X: Address = Address::new([0x0c; 20]);

    /// Clock that returns a settable second count.
    struct TestClock(AtomicI64);

    impl TestClock {
        fn at(secs: i64) -> Self {
            Self(AtomicI64::new(secs))
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_second(self.0.load(Ordering::SeqCst)).unwrap()
        }
    }

    impl Clock for &TestClock {
        fn now(&self) -> Timestamp {
            (**self).now()
        }
    }

    fn states(ledger: &Lifecycle<'_, impl Clock>, id: ItemId) -> Vec<State> {
        ledger.history(id).unwrap().iter().map(|r| r.state).collect()
    }

    // ── Scenarios ──

    #[test]
    fn harvest_creates_first_item() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);

        let id = ledger.harvest(FARMER, "Coffee").unwrap();

        assert_eq!(id, ItemId(1));
        let item = ledger.get(id).unwrap();
        assert_eq!(item.id, ItemId(1));
        assert_eq!(item.name, "Coffee");
        assert_eq!(item.owner, FARMER);
        assert_eq!(item.current_state, State::Harvested);
        assert_eq!(ledger.history(id).unwrap().len(), 1);
    }

    #[test]
    fn process_advances_harvested_item() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();

        ledger.process(PROCESSOR, id).unwrap();

        assert_eq!(ledger.get(id).unwrap().current_state, State::Processed);
        let history = ledger.history(id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].actor, PROCESSOR);
    }

    #[test]
    fn ship_to_zero_address_is_rejected() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        ledger.process(FARMER, id).unwrap();

        let err = ledger.ship(FARMER, id, Address::ZERO).unwrap_err();

        assert!(matches!(err, LedgerError::InvalidInput(_)));
        let item = ledger.get(id).unwrap();
        assert_eq!(item.current_state, State::Processed);
        assert_eq!(item.owner, FARMER);
        assert_eq!(ledger.history(id).unwrap().len(), 2);
    }

    #[test]
    fn full_lifecycle_transfers_ownership_and_ends() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        ledger.process(FARMER, id).unwrap();

        ledger.ship(FARMER, id, ADDR_X).unwrap();
        let item = ledger.get(id).unwrap();
        assert_eq!(item.owner, ADDR_X);
        assert_eq!(item.current_state, State::Shipped);

        ledger.receive(ADDR_X, id).unwrap();
        assert_eq!(ledger.get(id).unwrap().current_state, State::Received);

        assert!(matches!(
            ledger.receive(ADDR_X, id).unwrap_err(),
            LedgerError::InvalidState { current: State::Received, .. }
        ));
        assert!(matches!(
            ledger.process(ADDR_X, id).unwrap_err(),
            LedgerError::InvalidState { current: State::Received, .. }
        ));
        assert_eq!(
            states(&ledger, id),
            [
                State::Harvested,
                State::Processed,
                State::Shipped,
                State::Received
            ]
        );
    }

    #[test]
    fn commands_on_unknown_items_fail_not_found() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);

        assert!(matches!(
            ledger.process(FARMER, ItemId(99)).unwrap_err(),
            LedgerError::NotFound(ItemId(99))
        ));
        assert!(matches!(
            ledger.ship(FARMER, ItemId(99), ADDR_X).unwrap_err(),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            ledger.receive(FARMER, ItemId(99)).unwrap_err(),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            ledger.get(ItemId(0)).unwrap_err(),
            LedgerError::NotFound(ItemId(0))
        ));
        assert!(matches!(
            ledger.get(ItemId(99)).unwrap_err(),
            LedgerError::NotFound(_)
        ));
        assert!(ledger.history(ItemId(99)).unwrap().is_empty());
    }

    // ── Validation ──

    #[test]
    fn harvest_rejects_blank_names() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);

        for name in ["", "   ", "\t\n"] {
            assert!(matches!(
                ledger.harvest(FARMER, name).unwrap_err(),
                LedgerError::InvalidInput(_)
            ));
        }
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn harvest_keeps_name_as_given() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);

        let id = ledger.harvest(FARMER, " Organic Coffee Beans ").unwrap();

        assert_eq!(ledger.get(id).unwrap().name, " Organic Coffee Beans ");
    }

    #[test]
    fn zero_actor_is_rejected() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);

        assert!(matches!(
            ledger.harvest(Address::ZERO, "Coffee").unwrap_err(),
            LedgerError::InvalidInput(_)
        ));
        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        assert!(matches!(
            ledger.process(Address::ZERO, id).unwrap_err(),
            LedgerError::InvalidInput(_)
        ));
        assert_eq!(ledger.history(id).unwrap().len(), 1);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();

        assert!(matches!(
            ledger.ship(FARMER, id, ADDR_X).unwrap_err(),
            LedgerError::InvalidState {
                current: State::Harvested,
                target: State::Shipped,
                ..
            }
        ));
        assert!(matches!(
            ledger.receive(FARMER, id).unwrap_err(),
            LedgerError::InvalidState { .. }
        ));
        assert_eq!(ledger.get(id).unwrap().owner, FARMER);
        assert_eq!(states(&ledger, id), [State::Harvested]);
    }

    #[test]
    fn failed_commands_leave_item_unchanged() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        ledger.process(FARMER, id).unwrap();
        ledger.ship(FARMER, id, ADDR_X).unwrap();

        let before = (ledger.get(id).unwrap(), ledger.history(id).unwrap());

        assert!(ledger.process(FARMER, id).is_err());
        assert!(ledger.ship(FARMER, id, PROCESSOR).is_err());

        let after = (ledger.get(id).unwrap(), ledger.history(id).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn anyone_may_advance_a_correctly_staged_item() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let id = ledger.harvest(FARMER, "Coffee").unwrap();

        ledger.process(ADDR_X, id).unwrap();
        ledger.ship(PROCESSOR, id, ADDR_X).unwrap();
        ledger.receive(FARMER, id).unwrap();

        let actors: Vec<_> = ledger.history(id).unwrap().iter().map(|r| r.actor).collect();
        assert_eq!(actors, [FARMER, ADDR_X, PROCESSOR, FARMER]);
    }

    // ── Records and events ──

    #[test]
    fn records_carry_clock_time() {
        let (_dir, storage) = test_storage();
        let clock = TestClock::at(1_700_000_000);
        let ledger = Lifecycle::with_clock(&storage, &clock);

        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        clock.0.store(1_700_000_060, Ordering::SeqCst);
        ledger.process(FARMER, id).unwrap();

        let history = ledger.history(id).unwrap();
        assert_eq!(history[0].timestamp.as_second(), 1_700_000_000);
        assert_eq!(history[1].timestamp.as_second(), 1_700_000_060);
        ledger.verify(id).unwrap();
    }

    #[test]
    fn one_event_per_successful_transition() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::with_clock(&storage, TestClock::at(42));
        let events = ledger.subscribe();

        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        ledger.process(PROCESSOR, id).unwrap();
        let _ = ledger.process(PROCESSOR, id);
        let _ = ledger.ship(PROCESSOR, id, Address::ZERO);
        ledger.ship(PROCESSOR, id, ADDR_X).unwrap();
        ledger.receive(ADDR_X, id).unwrap();

        let got: Vec<_> = events.try_iter().collect();
        assert_eq!(got.len(), 4);
        assert_eq!(
            got[1],
            TransitionEvent {
                item_id: id,
                new_state: State::Processed,
                actor: PROCESSOR,
                timestamp: Timestamp::from_second(42).unwrap(),
            }
        );
        let seen: Vec<_> = got.iter().map(|e| e.new_state).collect();
        assert_eq!(seen, states(&ledger, id));
    }

    #[test]
    fn history_length_matches_successful_transitions() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let a = ledger.harvest(FARMER, "Coffee").unwrap();
        let b = ledger.harvest(FARMER, "Cocoa").unwrap();

        ledger.process(FARMER, a).unwrap();
        let _ = ledger.receive(FARMER, b);
        ledger.process(FARMER, b).unwrap();
        ledger.ship(FARMER, b, ADDR_X).unwrap();
        let _ = ledger.ship(FARMER, b, ADDR_X);

        assert_eq!(states(&ledger, a), [State::Harvested, State::Processed]);
        assert_eq!(
            states(&ledger, b),
            [State::Harvested, State::Processed, State::Shipped]
        );
    }

    #[test]
    fn storage_failures_surface_as_fatal() {
        let err = LedgerError::from(StorageError::Corrupt("bad row".into()));
        assert!(matches!(err, LedgerError::Fatal(_)));
        let err = LedgerError::from(StorageError::ItemNotFound(ItemId(3)));
        assert!(matches!(err, LedgerError::NotFound(ItemId(3))));
        let err = LedgerError::from(StorageError::IllegalTransition {
            item: ItemId(3),
            from: State::Harvested,
            to: State::Received,
        });
        assert!(matches!(
            err,
            LedgerError::InvalidState {
                current: State::Harvested,
                target: State::Received,
                ..
            }
        ));
    }

    // ── Concurrency ──

    #[test]
    fn concurrent_transitions_have_one_winner() {
        const RACERS: usize = 8;

        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let events = ledger.subscribe();
        let id = ledger.harvest(FARMER, "Coffee").unwrap();
        let barrier = Barrier::new(RACERS);

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..RACERS)
                .map(|i| {
                    let ledger = &ledger;
                    let barrier = &barrier;
                    s.spawn(move || {
                        let actor = Address::new([u8::try_from(i + 1).unwrap(); 20]);
                        barrier.wait();
                        ledger.process(actor, id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for err in results.into_iter().filter_map(core::result::Result::err) {
            assert!(matches!(
                err,
                LedgerError::InvalidState {
                    current: State::Processed,
                    ..
                }
            ));
        }
        assert_eq!(states(&ledger, id), [State::Harvested, State::Processed]);
        assert_eq!(events.try_iter().count(), 2);
    }

    #[test]
    fn events_arrive_in_commit_order() {
        const WORKERS: usize = 4;

        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let events = ledger.subscribe();
        let ids: Vec<_> = (0..5)
            .map(|i| ledger.harvest(FARMER, &format!("Lot {i}")).unwrap())
            .collect();
        let barrier = Barrier::new(WORKERS);

        std::thread::scope(|s| {
            for _ in 0..WORKERS {
                let (ledger, ids, barrier) = (&ledger, &ids, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    for &id in ids {
                        let _ = ledger.process(PROCESSOR, id);
                        let _ = ledger.ship(PROCESSOR, id, ADDR_X);
                        let _ = ledger.receive(ADDR_X, id);
                    }
                });
            }
        });

        let got: Vec<_> = events.try_iter().collect();
        for &id in &ids {
            let seen: Vec<_> = got
                .iter()
                .filter(|e| e.item_id == id)
                .map(|e| e.new_state)
                .collect();
            assert_eq!(seen, states(&ledger, id));
            assert_eq!(seen.len(), 4);
        }
    }

    #[test]
    fn transitions_on_different_items_are_independent() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let ids: Vec<_> = (0..6)
            .map(|i| ledger.harvest(FARMER, &format!("Lot {i}")).unwrap())
            .collect();

        std::thread::scope(|s| {
            for &id in &ids {
                let ledger = &ledger;
                s.spawn(move || {
                    ledger.process(FARMER, id).unwrap();
                    ledger.ship(FARMER, id, ADDR_X).unwrap();
                    ledger.receive(ADDR_X, id).unwrap();
                });
            }
        });

        for id in ids {
            assert_eq!(ledger.get(id).unwrap().current_state, State::Received);
            assert_eq!(ledger.verify(id).unwrap().records, 4);
        }
    }

    #[test]
    fn readers_never_see_state_without_its_record() {
        let (_dir, storage) = test_storage();
        let ledger = Lifecycle::new(&storage);
        let ids: Vec<_> = (0..20)
            .map(|i| ledger.harvest(FARMER, &format!("Lot {i}")).unwrap())
            .collect();

        std::thread::scope(|s| {
            let writer_ids = ids.clone();
            let ledger_ref = &ledger;
            s.spawn(move || {
                for id in writer_ids {
                    ledger_ref.process(FARMER, id).unwrap();
                    ledger_ref.ship(FARMER, id, ADDR_X).unwrap();
                }
            });

            s.spawn(|| {
                for _ in 0..5 {
                    for &id in &ids {
                        // Read state first: the history read afterwards can only be longer.
                        let state = ledger.get(id).unwrap().current_state;
                        let history = ledger.history(id).unwrap();
                        assert!(history.iter().any(|r| r.state == state));
                    }
                }
            });
        });
    }
}
