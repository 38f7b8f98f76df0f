// Reconciliation engine
// Finds slots that two independent services both have free, books the earliest
// pair on both, then makes one pass looking for earlier common availability.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    client::ReservationApi,
    error::ReservationError,
    slot::{common_slot_ids, SlotId},
};

// Informational cap on the common-slot listing
pub const COMMON_SLOT_LIMIT: usize = 20;
pub const BOOKING_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub display_limit: usize,
    // Pause before rechecking availability in the improvement pass
    pub settle_delay: Duration,
    // Release a reservation again when the partner service refused the same slot.
    // Off by default: the reference flow leaves such reservations in place.
    pub release_partial_reservations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_limit: COMMON_SLOT_LIMIT,
            settle_delay: Duration::from_secs(1),
            release_partial_reservations: false,
        }
    }
}

/// Where a booking attempt ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    NoSlotsHeld,
    // Common slots existed but the pair could not be reserved on both services
    CandidatesFound(Vec<SlotId>),
    PairReserved(Vec<SlotId>),
    Replaced {
        previous: Vec<SlotId>,
        current: Vec<SlotId>,
    },
    Unchanged(Vec<SlotId>),
}

impl BookingOutcome {
    pub fn booked(&self) -> &[SlotId] {
        match self {
            Self::NoSlotsHeld | Self::CandidatesFound(_) => &[],
            Self::PairReserved(slots) | Self::Unchanged(slots) => slots,
            Self::Replaced { current, .. } => current,
        }
    }
}

/// Releases every slot the service currently holds.
///
/// Individual release failures are logged and skipped. Returns how many
/// releases the service confirmed.
pub async fn clear_existing_bookings(client: &dyn ReservationApi) -> usize {
    let held = match client.list_held().await {
        Ok(held) => held,
        Err(e) => {
            error!(service = client.name(), "Error fetching held slots: {}", e);
            return 0;
        }
    };

    let mut released = 0;
    for slot in held {
        match client.release(&slot.id).await {
            Ok(true) => {
                info!(service = client.name(), "Released existing slot {}", slot.id);
                released += 1;
            }
            Ok(false) => {
                warn!(service = client.name(), "Release of slot {} was not confirmed", slot.id)
            }
            Err(e) => error!(
                service = client.name(),
                "Error releasing slot {}: {}", slot.id, e
            ),
        }
    }
    released
}

pub struct Reconciler<'a> {
    first: &'a dyn ReservationApi,
    second: &'a dyn ReservationApi,
    config: EngineConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        first: &'a dyn ReservationApi,
        second: &'a dyn ReservationApi,
        config: EngineConfig,
    ) -> Self {
        Self {
            first,
            second,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ascending ids both services list as available, capped at the display limit.
    pub async fn find_common_slots(&self) -> Result<Vec<SlotId>, ReservationError> {
        let first = self.first.list_available().await?;
        let second = self.second.list_available().await?;

        let common = common_slot_ids(&first, &second, self.config.display_limit);
        info!(
            first = self.first.name(),
            second = self.second.name(),
            "First {} common slots:",
            common.len()
        );
        for slot in &common {
            info!("Slot ID: {}", slot);
        }
        Ok(common)
    }

    /// Reserves the two earliest common slots on both services.
    ///
    /// Returns `None` as soon as either service refuses either slot. Slots
    /// reserved before the refusal are not part of any booking.
    pub async fn book_earliest_pair(&self, common_slots: &[SlotId]) -> Option<Vec<SlotId>> {
        if common_slots.is_empty() {
            info!("No common slots available.");
            return None;
        }

        let mut chosen = common_slots.to_vec();
        chosen.sort();
        chosen.dedup();
        chosen.truncate(BOOKING_SIZE);

        let mut booked = Vec::with_capacity(chosen.len());
        for slot in chosen {
            if self.reserve_on_both(&slot).await {
                info!(
                    "Successfully reserved slot {} for both {} and {}.",
                    slot,
                    self.first.name(),
                    self.second.name()
                );
                booked.push(slot);
            } else {
                error!(
                    "Failed to reserve slot {} for both {} and {}.",
                    slot,
                    self.first.name(),
                    self.second.name()
                );
                self.abandon(&booked).await;
                return None;
            }
        }
        Some(booked)
    }

    /// One recheck for common slots earlier than the current booking.
    ///
    /// One earlier slot replaces the later held slot; on failure the previous
    /// booking is reported even though its later slot was already released.
    /// Two or more earlier slots replace the whole booking, and whatever subset
    /// of them was reserved on both services is returned without rollback.
    pub async fn improve_booking(&self, current: &[SlotId]) -> Vec<SlotId> {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let common = match self.find_common_slots().await {
            Ok(common) => common,
            Err(e) => {
                error!("An error occurred during recheck for better bookings: {}", e);
                return current.to_vec();
            }
        };
        if common.is_empty() {
            info!("No better common slots available.");
            return current.to_vec();
        }

        let mut held = current.to_vec();
        held.sort();
        let Some(earliest) = held.first().cloned() else {
            return current.to_vec();
        };

        let better: Vec<SlotId> = common.into_iter().filter(|slot| *slot < earliest).collect();

        match better.as_slice() {
            [] => {
                info!("No earlier slots available.");
                current.to_vec()
            }
            [candidate] => {
                info!("1 earlier slot available.");
                self.replace_latest(&held, candidate, current).await
            }
            _ => {
                info!("{} earlier slots available.", better.len());
                self.replace_all(&held, &better).await
            }
        }
    }

    /// Full pair flow: clear, find, book and, when asked, one improvement pass.
    pub async fn run(&self, improve: bool) -> BookingOutcome {
        let cleared_first = clear_existing_bookings(self.first).await;
        let cleared_second = clear_existing_bookings(self.second).await;
        info!(
            "Cleared {} existing slots on {} and {} on {}",
            cleared_first,
            self.first.name(),
            cleared_second,
            self.second.name()
        );

        let common = match self.find_common_slots().await {
            Ok(common) => common,
            Err(e) => {
                error!("An error occurred when fetching common slots: {}", e);
                return BookingOutcome::NoSlotsHeld;
            }
        };
        if common.is_empty() {
            info!("No common slots available.");
            return BookingOutcome::NoSlotsHeld;
        }

        let Some(pair) = self.book_earliest_pair(&common).await else {
            return BookingOutcome::CandidatesFound(common);
        };
        if !improve {
            info!("Successfully booked the following slots: {:?}", pair);
            return BookingOutcome::PairReserved(pair);
        }

        let mut previous = pair.clone();
        previous.sort();
        let mut current = self.improve_booking(&pair).await;
        current.sort();

        info!("Successfully booked the following slots: {:?}", current);
        if current == previous {
            BookingOutcome::Unchanged(current)
        } else {
            BookingOutcome::Replaced { previous, current }
        }
    }

    async fn replace_latest(
        &self,
        held: &[SlotId],
        candidate: &SlotId,
        current: &[SlotId],
    ) -> Vec<SlotId> {
        // A lone held slot is kept and the candidate joins it
        let to_release = if held.len() > 1 { held.last() } else { None };
        if let Some(slot) = to_release {
            self.release_on_both(slot).await;
            info!("Released slot {}", slot);
        }

        if self.reserve_on_both(candidate).await {
            info!("Successfully booked slot {}", candidate);
            let mut pair = vec![held[0].clone(), candidate.clone()];
            pair.sort();
            pair
        } else {
            error!("Failed to book slot {}", candidate);
            if let Some(slot) = to_release {
                warn!(
                    "Slot {} was released and is no longer held; reporting the previous booking",
                    slot
                );
            }
            current.to_vec()
        }
    }

    async fn replace_all(&self, held: &[SlotId], better: &[SlotId]) -> Vec<SlotId> {
        for slot in held {
            self.release_on_both(slot).await;
            info!("Released slot {}", slot);
        }

        let mut booked = Vec::with_capacity(BOOKING_SIZE);
        for slot in better.iter().take(BOOKING_SIZE) {
            if self.reserve_on_both(slot).await {
                info!("Successfully booked slot {}", slot);
                booked.push(slot.clone());
            } else {
                error!("Failed to book slot {}", slot);
            }
        }

        if booked.len() < BOOKING_SIZE {
            warn!(
                "Only {} of {} earlier slots were booked; the previous booking was already released",
                booked.len(),
                BOOKING_SIZE
            );
        }
        booked
    }

    // A slot counts only when both services accept it. The second service is
    // not asked once the first has refused.
    async fn reserve_on_both(&self, slot: &SlotId) -> bool {
        if !try_reserve(self.first, slot).await {
            return false;
        }
        if try_reserve(self.second, slot).await {
            return true;
        }

        if self.config.release_partial_reservations {
            release_logged(self.first, slot).await;
        } else {
            warn!(
                "Slot {} remains reserved on {} without a matching reservation on {}",
                slot,
                self.first.name(),
                self.second.name()
            );
        }
        false
    }

    async fn release_on_both(&self, slot: &SlotId) {
        release_logged(self.first, slot).await;
        release_logged(self.second, slot).await;
    }

    // Slots reserved on both services by an attempt that later failed
    async fn abandon(&self, reserved: &[SlotId]) {
        for slot in reserved {
            if self.config.release_partial_reservations {
                self.release_on_both(slot).await;
            } else {
                warn!(
                    "Slot {} remains reserved on {} and {} but is not part of a booking",
                    slot,
                    self.first.name(),
                    self.second.name()
                );
            }
        }
    }
}

async fn try_reserve(client: &dyn ReservationApi, slot: &SlotId) -> bool {
    match client.reserve(slot).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(service = client.name(), "Reservation of slot {} was not confirmed", slot);
            false
        }
        Err(e) if e.is_rejection() => {
            warn!(service = client.name(), "Slot {} refused: {}", slot, e);
            false
        }
        Err(e) => {
            error!(service = client.name(), "Error reserving slot {}: {}", slot, e);
            false
        }
    }
}

async fn release_logged(client: &dyn ReservationApi, slot: &SlotId) -> bool {
    match client.release(slot).await {
        Ok(confirmed) => confirmed,
        Err(e) => {
            error!(service = client.name(), "Error releasing slot {}: {}", slot, e);
            false
        }
    }
}
