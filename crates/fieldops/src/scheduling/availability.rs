use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Technician, TechnicianId, TimeSlot};
use super::error::SchedulingError;
use super::repository::{AssignmentStore, LeaveLedger, TechnicianDirectory};

/// Fixed list of bookable slot start times, kept sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCatalog {
    slots: Vec<TimeSlot>,
}

impl SlotCatalog {
    pub fn new(slots: impl IntoIterator<Item = TimeSlot>) -> Self {
        let slots: BTreeSet<TimeSlot> = slots.into_iter().collect();
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    pub(crate) fn ensure_contains(&self, slot: TimeSlot) -> Result<(), SchedulingError> {
        if self.contains(slot) {
            Ok(())
        } else {
            Err(SchedulingError::Invalid(format!(
                "{slot} is not a bookable slot"
            )))
        }
    }
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self::new(
            [(8, 0), (9, 0), (10, 0), (11, 0), (13, 0), (14, 0), (15, 0), (16, 0)]
                .into_iter()
                .filter_map(|(hour, minute)| TimeSlot::from_hm(hour, minute)),
        )
    }
}

/// Capacity snapshot for one catalog slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub slot: TimeSlot,
    pub capacity: usize,
    pub demand: usize,
    pub open: bool,
}

/// Stateless availability queries; every call re-reads the directory, ledger and assignments.
pub struct AvailabilityResolver<S> {
    store: Arc<S>,
    catalog: SlotCatalog,
}

impl<S> AvailabilityResolver<S>
where
    S: TechnicianDirectory + LeaveLedger + AssignmentStore + 'static,
{
    pub fn new(store: Arc<S>, catalog: SlotCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// Active technicians free at `date`/`slot`, ordered by identifier.
    pub fn find_available(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<&TechnicianId>,
    ) -> Result<Vec<Technician>, SchedulingError> {
        let on_leave = self.technicians_on_leave(date)?;

        let mut busy: BTreeSet<TechnicianId> = self
            .store
            .appointments_at(date, slot)?
            .into_iter()
            .map(|appointment| appointment.technician_id)
            .collect();
        for project in self.store.projects_at(date, slot)? {
            busy.extend(project.assigned_to);
        }

        let mut available: Vec<Technician> = self
            .store
            .technicians()?
            .into_iter()
            .filter(|technician| technician.active)
            .filter(|technician| !on_leave.contains(&technician.id))
            .filter(|technician| !busy.contains(&technician.id))
            .filter(|technician| Some(&technician.id) != exclude)
            .collect();
        available.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(available)
    }

    /// Catalog slots on `date` where assigned demand is still below effective capacity.
    pub fn list_open_slots(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
        Ok(self
            .slot_overview(date)?
            .into_iter()
            .filter(|entry| entry.open)
            .map(|entry| entry.slot)
            .collect())
    }

    pub fn slot_overview(&self, date: NaiveDate) -> Result<Vec<SlotAvailability>, SchedulingError> {
        let active: BTreeSet<TechnicianId> = self
            .store
            .technicians()?
            .into_iter()
            .filter(|technician| technician.active)
            .map(|technician| technician.id)
            .collect();
        let absent = self
            .technicians_on_leave(date)?
            .intersection(&active)
            .count();
        let capacity = active.len().saturating_sub(absent);

        let mut overview = Vec::with_capacity(self.catalog.slots().len());
        for &slot in self.catalog.slots() {
            let demand: usize = self
                .store
                .projects_at(date, slot)?
                .iter()
                .map(|project| project.assigned_to.len())
                .sum();
            overview.push(SlotAvailability {
                slot,
                capacity,
                demand,
                open: capacity > 0 && demand < capacity,
            });
        }

        Ok(overview)
    }

    /// Distinct technicians with approved leave covering `date`.
    fn technicians_on_leave(&self, date: NaiveDate) -> Result<BTreeSet<TechnicianId>, SchedulingError> {
        Ok(self
            .store
            .approved_leave_on(date)?
            .into_iter()
            .map(|leave| leave.technician_id)
            .collect())
    }
}
