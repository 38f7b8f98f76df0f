// In-memory reservation service for tests, benches and offline runs.
// Behaves like the remote API: reserving moves a slot from the available pool
// to the held set, releasing moves it back, and refusals surface as the same
// error kinds the HTTP client maps from status codes.

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    client::{ClientStats, ReservationApi, StatsSnapshot},
    error::ReservationError,
    slot::{Slot, SlotId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListAvailable,
    ListHeld,
    Reserve(SlotId),
    Release(SlotId),
}

#[derive(Debug, Default)]
struct ServiceState {
    available: BTreeSet<SlotId>,
    held: BTreeSet<SlotId>,
    refused: BTreeSet<SlotId>,
    pinned: BTreeSet<SlotId>,
    hold_limit: Option<usize>,
    calls: Vec<Call>,
}

pub struct MockReservationService {
    name: String,
    state: Mutex<ServiceState>,
    fail_next_requests: AtomicUsize,
    stats: ClientStats,
}

fn ids(slots: impl IntoIterator<Item = u64>) -> impl Iterator<Item = SlotId> {
    slots.into_iter().map(SlotId::Number)
}

impl MockReservationService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ServiceState::default()),
            fail_next_requests: AtomicUsize::new(0),
            stats: ClientStats::default(),
        }
    }

    pub fn with_available(self, slots: impl IntoIterator<Item = u64>) -> Self {
        self.state.lock().available.extend(ids(slots));
        self
    }

    pub fn with_held(self, slots: impl IntoIterator<Item = u64>) -> Self {
        self.state.lock().held.extend(ids(slots));
        self
    }

    // For services that hand out non-numeric ids
    pub fn with_available_ids(self, slots: impl IntoIterator<Item = SlotId>) -> Self {
        self.state.lock().available.extend(slots);
        self
    }

    pub fn with_hold_limit(self, limit: usize) -> Self {
        self.state.lock().hold_limit = Some(limit);
        self
    }

    // Reservations of these slots answer 409 even when they look available
    pub fn refuse(&self, slots: impl IntoIterator<Item = u64>) {
        self.state.lock().refused.extend(ids(slots));
    }

    // Releases of these slots answer 404 and the slot stays held
    pub fn pin_held(&self, slots: impl IntoIterator<Item = u64>) {
        self.state.lock().pinned.extend(ids(slots));
    }

    pub fn make_available(&self, slots: impl IntoIterator<Item = u64>) {
        self.state.lock().available.extend(ids(slots));
    }

    // The next `count` calls fail as if every retry hit a 503
    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next_requests.store(count, Ordering::SeqCst);
    }

    pub fn held_ids(&self) -> Vec<SlotId> {
        self.state.lock().held.iter().cloned().collect()
    }

    pub fn available_ids(&self) -> Vec<SlotId> {
        self.state.lock().available.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: Call) -> Result<(), ReservationError> {
        self.stats.requests_sent.fetch_add(1, Ordering::SeqCst);
        self.state.lock().calls.push(call);

        let remaining = self.fail_next_requests.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_requests
                .store(remaining - 1, Ordering::SeqCst);
            self.stats.requests_failed.fetch_add(1, Ordering::SeqCst);
            return Err(ReservationError::RetriesExhausted {
                attempts: 1,
                last_failure: "503 Service Unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn finish<T>(&self, result: Result<T, ReservationError>) -> Result<T, ReservationError> {
        let counter = if result.is_ok() {
            &self.stats.requests_succeeded
        } else {
            &self.stats.requests_failed
        };
        counter.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ReservationApi for MockReservationService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_available(&self) -> Result<Vec<Slot>, ReservationError> {
        self.record(Call::ListAvailable)?;
        let slots = self.state.lock().available.iter().cloned().map(|id| Slot { id }).collect();
        self.finish(Ok(slots))
    }

    async fn list_held(&self) -> Result<Vec<Slot>, ReservationError> {
        self.record(Call::ListHeld)?;
        let slots = self.state.lock().held.iter().cloned().map(|id| Slot { id }).collect();
        self.finish(Ok(slots))
    }

    async fn reserve(&self, slot_id: &SlotId) -> Result<bool, ReservationError> {
        self.record(Call::Reserve(slot_id.clone()))?;

        let result = {
            let mut state = self.state.lock();
            if state.refused.contains(slot_id) || !state.available.contains(slot_id) {
                Err(ReservationError::SlotUnavailable(format!(
                    "Slot {slot_id} is not available"
                )))
            } else if state.hold_limit.is_some_and(|limit| state.held.len() >= limit) {
                Err(ReservationError::ReservationLimit(
                    "The client already holds the maximum number of reservations".to_string(),
                ))
            } else {
                state.available.remove(slot_id);
                state.held.insert(slot_id.clone());
                Ok(true)
            }
        };
        self.finish(result)
    }

    async fn release(&self, slot_id: &SlotId) -> Result<bool, ReservationError> {
        self.record(Call::Release(slot_id.clone()))?;

        let result = {
            let mut state = self.state.lock();
            if state.pinned.contains(slot_id) {
                Err(ReservationError::NotProcessed(format!(
                    "Slot {slot_id} could not be released"
                )))
            } else if state.held.remove(slot_id) {
                state.available.insert(slot_id.clone());
                Ok(true)
            } else {
                Err(ReservationError::BadSlot(format!(
                    "Slot {slot_id} is not held by this client"
                )))
            }
        };
        self.finish(result)
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_and_release_move_slots() {
        let service = MockReservationService::new("hotel").with_available([1, 2, 3]);

        assert!(service.reserve(&SlotId::Number(2)).await.unwrap());
        assert_eq!(service.held_ids(), vec![SlotId::Number(2)]);
        assert_eq!(service.available_ids(), vec![SlotId::Number(1), SlotId::Number(3)]);

        assert!(service.release(&SlotId::Number(2)).await.unwrap());
        assert!(service.held_ids().is_empty());
        assert_eq!(service.available_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_refusals_map_to_error_kinds() {
        let service = MockReservationService::new("band")
            .with_available([1, 2, 3])
            .with_hold_limit(1);
        service.refuse([3]);

        assert!(matches!(
            service.reserve(&SlotId::Number(3)).await,
            Err(ReservationError::SlotUnavailable(_))
        ));
        assert!(service.reserve(&SlotId::Number(1)).await.unwrap());
        assert!(matches!(
            service.reserve(&SlotId::Number(2)).await,
            Err(ReservationError::ReservationLimit(_))
        ));
        assert!(matches!(
            service.release(&SlotId::Number(9)).await,
            Err(ReservationError::BadSlot(_))
        ));

        service.pin_held([1]);
        assert!(matches!(
            service.release(&SlotId::Number(1)).await,
            Err(ReservationError::NotProcessed(_))
        ));
        assert_eq!(service.held_ids(), vec![SlotId::Number(1)]);
    }

    #[tokio::test]
    async fn test_fail_next_requests() {
        let service = MockReservationService::new("hotel").with_available([1]);
        service.fail_next_requests(2);

        assert!(service.list_available().await.is_err());
        assert!(service.list_available().await.is_err());
        assert_eq!(service.list_available().await.unwrap(), vec![Slot::new(1u64)]);

        let stats = service.stats();
        assert_eq!(stats.requests_sent, 3);
        assert_eq!(stats.requests_failed, 2);
        assert_eq!(stats.requests_succeeded, 1);
    }
}
