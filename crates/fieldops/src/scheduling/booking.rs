use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use super::availability::SlotCatalog;
use super::domain::{
    Appointment, AppointmentId, AppointmentStatus, ClientInfo, ProjectId, TechnicianId, TimeSlot,
};
use super::error::SchedulingError;
use super::repository::{AssignmentStore, TechnicianDirectory};

static APPOINTMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_appointment_id() -> AppointmentId {
    let id = APPOINTMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AppointmentId(format!("appt-{id:06}"))
}

/// Commitment of a technician to a project slot, as submitted by booking and admin UIs.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub project_id: ProjectId,
    pub technician_id: TechnicianId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default)]
    pub notes: String,
}

/// Creates appointments through the store's conditional booking write.
pub struct BookingService<S> {
    store: Arc<S>,
    catalog: SlotCatalog,
}

impl<S> BookingService<S>
where
    S: TechnicianDirectory + AssignmentStore + 'static,
{
    pub fn new(store: Arc<S>, catalog: SlotCatalog) -> Self {
        Self { store, catalog }
    }

    /// Book the technician; a `Conflict` means the slot was taken and availability should be
    /// re-fetched.
    pub fn book(&self, request: BookingRequest) -> Result<Appointment, SchedulingError> {
        self.catalog.ensure_contains(request.slot)?;

        let technician = self
            .store
            .fetch_technician(&request.technician_id)?
            .ok_or_else(|| SchedulingError::not_found("technician", &request.technician_id))?;
        if !technician.working_hours.covers(request.date, request.slot) {
            warn!(
                technician = %technician.id,
                date = %request.date,
                slot = %request.slot,
                "booking outside the technician's working hours"
            );
        }

        let appointment = Appointment {
            id: next_appointment_id(),
            technician_id: request.technician_id,
            project_id: request.project_id,
            date: request.date,
            slot: request.slot,
            status: AppointmentStatus::Scheduled,
            notes: request.notes,
            client: request.client,
            photos: Vec::new(),
            check_in_time: None,
            check_out_time: None,
        };

        let stored = self.store.book(appointment)?;
        info!(
            appointment = %stored.id,
            technician = %stored.technician_id,
            project = %stored.project_id,
            date = %stored.date,
            slot = %stored.slot,
            "appointment booked"
        );
        Ok(stored)
    }
}
