use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::domain::{Appointment, AppointmentId, AppointmentStatus};
use super::error::SchedulingError;
use super::repository::AssignmentStore;

/// Appointment state machine: `scheduled -> in_progress -> completed`, with `cancelled` as the exit.
///
/// Side effects depend only on the target state. Sequencing rules (for example refusing
/// `completed` before `in_progress`) are left to callers.
pub struct AppointmentLifecycle<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> AppointmentLifecycle<S>
where
    S: AssignmentStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn get(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        self.store
            .fetch_appointment(id)?
            .ok_or_else(|| SchedulingError::not_found("appointment", id))
    }

    /// Move to `status`, stamping check-in on `in_progress` and check-out on `completed`.
    /// Stamps are written once and never overwritten by re-entering the state. Cancelling
    /// releases the technician's slot; leaving `cancelled` claims it again.
    pub fn set_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let updated = self.store.set_status(id, status, self.clock.now())?;

        info!(appointment = %id, status = status.label(), "appointment status updated");
        Ok(updated)
    }

    /// Append photo evidence references; existing entries are never removed.
    pub fn append_photos(
        &self,
        id: &AppointmentId,
        photos: Vec<String>,
    ) -> Result<Appointment, SchedulingError> {
        let mut incoming = Some(photos);
        let updated = self.store.modify_appointment(id, &mut |appointment: &mut Appointment| {
            if let Some(photos) = incoming.take() {
                appointment.photos.extend(photos);
            }
        })?;
        Ok(updated)
    }

    /// Administrative override clearing check-in and check-out stamps.
    pub fn clear_timestamps(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        let updated = self
            .store
            .modify_appointment(id, &mut |appointment: &mut Appointment| {
                appointment.check_in_time = None;
                appointment.check_out_time = None;
            })?;

        info!(appointment = %id, "appointment timestamps cleared by override");
        Ok(updated)
    }
}
