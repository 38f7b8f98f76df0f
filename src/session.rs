// Single-service session: inspect a service, take its first two free slots,
// then hand everything back.

use tracing::{error, info};

use crate::{
    client::ReservationApi,
    reconcile::{clear_existing_bookings, BOOKING_SIZE},
    slot::{Slot, SlotId},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub available: Vec<SlotId>,
    pub reserved: Option<Vec<SlotId>>,
    pub held_after_reserve: Vec<SlotId>,
    pub released: usize,
    pub held_after_release: Vec<SlotId>,
}

fn slot_ids(slots: &[Slot]) -> Vec<SlotId> {
    slots.iter().map(|slot| slot.id.clone()).collect()
}

pub async fn view_slots_available(client: &dyn ReservationApi) -> Vec<SlotId> {
    match client.list_available().await {
        Ok(slots) => {
            let ids = slot_ids(&slots);
            info!(service = client.name(), "Available slots: {:?}", ids);
            ids
        }
        Err(e) => {
            error!(
                service = client.name(),
                "An error occurred when fetching available slots: {}", e
            );
            Vec::new()
        }
    }
}

pub async fn view_slots_held(client: &dyn ReservationApi) -> Vec<SlotId> {
    match client.list_held().await {
        Ok(slots) => {
            let ids = slot_ids(&slots);
            info!(service = client.name(), "Held slots: {:?}", ids);
            ids
        }
        Err(e) => {
            error!(
                service = client.name(),
                "An error occurred when fetching held slots: {}", e
            );
            Vec::new()
        }
    }
}

/// Reserves the first two slots the service lists as available.
///
/// The second reservation is only attempted once the first succeeded.
pub async fn reserve_first_available(client: &dyn ReservationApi) -> Option<Vec<SlotId>> {
    let available = match client.list_available().await {
        Ok(slots) => slot_ids(&slots),
        Err(e) => {
            error!(service = client.name(), "An error occurred during reservation: {}", e);
            return None;
        }
    };

    if available.len() < BOOKING_SIZE {
        info!(service = client.name(), "Not enough available slots.");
        return None;
    }

    let chosen = available[..BOOKING_SIZE].to_vec();
    for slot in &chosen {
        match client.reserve(slot).await {
            Ok(true) => {}
            Ok(false) => {
                error!(service = client.name(), "Failed to reserve slots {:?}", chosen);
                return None;
            }
            Err(e) => {
                error!(
                    service = client.name(),
                    "An error occurred during reservation of slot {}: {}", slot, e
                );
                return None;
            }
        }
    }

    info!(service = client.name(), "Successfully reserved slots {:?}", chosen);
    Some(chosen)
}

// Each step degrades on its own; a failed step never stops the next one
pub async fn run_single_service_session(client: &dyn ReservationApi) -> SessionReport {
    let available = view_slots_available(client).await;
    let reserved = reserve_first_available(client).await;
    let held_after_reserve = view_slots_held(client).await;

    let released = if held_after_reserve.is_empty() {
        info!(service = client.name(), "No bookings to release.");
        0
    } else {
        clear_existing_bookings(client).await
    };
    let held_after_release = view_slots_held(client).await;

    SessionReport {
        available,
        reserved,
        held_after_reserve,
        released,
        held_after_release,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_service::MockReservationService;

    fn ids(slots: &[u64]) -> Vec<SlotId> {
        slots.iter().copied().map(SlotId::Number).collect()
    }

    #[tokio::test]
    async fn test_reserve_first_available() {
        let hotel = MockReservationService::new("hotel").with_available([4, 2, 9]);

        assert_eq!(reserve_first_available(&hotel).await, Some(ids(&[2, 4])));
        assert_eq!(hotel.held_ids(), ids(&[2, 4]));
    }

    #[tokio::test]
    async fn test_reserve_first_available_needs_two_slots() {
        let hotel = MockReservationService::new("hotel").with_available([4]);

        assert_eq!(reserve_first_available(&hotel).await, None);
        assert!(hotel.held_ids().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_first_available_stops_on_refusal() {
        let hotel = MockReservationService::new("hotel").with_available([1, 2]);
        hotel.refuse([1]);

        assert_eq!(reserve_first_available(&hotel).await, None);
        assert!(hotel.held_ids().is_empty());
    }

    #[tokio::test]
    async fn test_single_service_session() {
        let hotel = MockReservationService::new("hotel").with_available([1, 2, 3]);

        let report = run_single_service_session(&hotel).await;

        assert_eq!(report.available, ids(&[1, 2, 3]));
        assert_eq!(report.reserved, Some(ids(&[1, 2])));
        assert_eq!(report.held_after_reserve, ids(&[1, 2]));
        assert_eq!(report.released, 2);
        assert!(report.held_after_release.is_empty());
    }

    #[tokio::test]
    async fn test_single_service_session_survives_failures() {
        let hotel = MockReservationService::new("hotel").with_available([1, 2, 3]);
        // Both availability listings fail
        hotel.fail_next_requests(2);

        let report = run_single_service_session(&hotel).await;

        assert!(report.available.is_empty());
        assert_eq!(report.reserved, None);
        assert!(report.held_after_reserve.is_empty());
        assert_eq!(report.released, 0);
        assert!(report.held_after_release.is_empty());
    }
}
