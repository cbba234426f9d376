use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::availability::AvailabilityResolver;
use super::clock::Clock;
use super::domain::{
    AdminRequest, AdminRequestDetails, AdminRequestId, AdminRequestStatus, Appointment,
    AppointmentId, IncidentDetails, ProjectId, RequestPriority, RescheduleRequestDetails,
    TechnicianId, UserId,
};
use super::error::SchedulingError;
use super::repository::{
    AdminRequestLog, AssignmentStore, LeaveLedger, Notifier, Reassignment, TechnicianDirectory,
    TechnicianNotice,
};

pub const MANUAL_RESCHEDULE_ACTION: &str = "manual reschedule needed";

static ADMIN_REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_admin_request_id() -> AdminRequestId {
    let id = ADMIN_REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AdminRequestId(format!("req-{id:06}"))
}

/// Technician-reported inability to attend an appointment.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentReport {
    pub reason: String,
    #[serde(default)]
    pub comment: String,
    pub reporter_id: UserId,
}

/// Result of the incident workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IncidentOutcome {
    Reassigned {
        new_technician_id: TechnicianId,
        request_id: AdminRequestId,
    },
    RequestCreated {
        request_id: AdminRequestId,
    },
}

/// Incident workflow: search for a replacement technician, reassign automatically, or escalate.
pub struct ReassignmentOrchestrator<S, N> {
    store: Arc<S>,
    resolver: Arc<AvailabilityResolver<S>>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    public_url: String,
}

impl<S, N> ReassignmentOrchestrator<S, N>
where
    S: TechnicianDirectory + LeaveLedger + AssignmentStore + AdminRequestLog + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        resolver: Arc<AvailabilityResolver<S>>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            notifier,
            clock,
            public_url: public_url.into(),
        }
    }

    pub fn report_incident(
        &self,
        appointment_id: &AppointmentId,
        report: IncidentReport,
    ) -> Result<IncidentOutcome, SchedulingError> {
        let appointment = self.load(appointment_id)?;
        let original = appointment.technician_id.clone();
        let reported_at = self.clock.now();

        let candidates =
            self.resolver
                .find_available(appointment.date, appointment.slot, Some(&original))?;

        let Some(replacement) = candidates.into_iter().next() else {
            let request = AdminRequest {
                id: next_admin_request_id(),
                priority: RequestPriority::High,
                status: AdminRequestStatus::Pending,
                requester_id: report.reporter_id,
                appointment_id: appointment.id.clone(),
                details: AdminRequestDetails::RescheduleRequest(RescheduleRequestDetails {
                    reason: report.reason,
                    comment: report.comment,
                    reported_at,
                    technician_id: original,
                    suggested_action: MANUAL_RESCHEDULE_ACTION.to_string(),
                }),
                created_at: reported_at,
            };
            let stored = self.store.insert_admin_request(request)?;
            warn!(
                appointment = %appointment.id,
                request = %stored.id,
                "no replacement technician available; escalated for manual reschedule"
            );
            return Ok(IncidentOutcome::RequestCreated {
                request_id: stored.id,
            });
        };

        let request_id = next_admin_request_id();
        let audit = AdminRequest {
            id: request_id.clone(),
            priority: RequestPriority::Normal,
            status: AdminRequestStatus::AutoResolved,
            requester_id: report.reporter_id,
            appointment_id: appointment.id.clone(),
            details: AdminRequestDetails::IncidentReport(IncidentDetails {
                reason: report.reason,
                comment: report.comment,
                reported_at,
                original_technician_id: original.clone(),
                new_technician_id: replacement.id.clone(),
                resolution: format!(
                    "automatically reassigned from {} to {} ({})",
                    original, replacement.id, replacement.name
                ),
            }),
            created_at: reported_at,
        };

        let updated = self.store.reassign(Reassignment {
            appointment_id: appointment.id.clone(),
            project_id: appointment.project_id.clone(),
            new_technician_id: replacement.id.clone(),
            audit: Some(audit),
        })?;
        info!(
            appointment = %updated.id,
            from = %original,
            to = %updated.technician_id,
            "incident resolved by automatic reassignment"
        );
        self.notify_assignment(&updated);

        Ok(IncidentOutcome::Reassigned {
            new_technician_id: updated.technician_id,
            request_id,
        })
    }

    /// Move an appointment and its project to `new_technician_id`, resetting the visit to
    /// `scheduled`.
    pub fn reassign(
        &self,
        appointment_id: &AppointmentId,
        new_technician_id: &TechnicianId,
        project_id: &ProjectId,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load(appointment_id)?;
        if &appointment.project_id != project_id {
            return Err(SchedulingError::Invalid(format!(
                "appointment {appointment_id} belongs to project {}, not {project_id}",
                appointment.project_id
            )));
        }

        let updated = self.store.reassign(Reassignment {
            appointment_id: appointment_id.clone(),
            project_id: project_id.clone(),
            new_technician_id: new_technician_id.clone(),
            audit: None,
        })?;
        info!(
            appointment = %updated.id,
            from = %appointment.technician_id,
            to = %updated.technician_id,
            "appointment reassigned"
        );
        self.notify_assignment(&updated);

        Ok(updated)
    }

    /// Audit and escalation records raised for an appointment.
    pub fn requests_for(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Vec<AdminRequest>, SchedulingError> {
        Ok(self.store.admin_requests_for(appointment_id)?)
    }

    fn load(&self, appointment_id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        self.store
            .fetch_appointment(appointment_id)?
            .ok_or_else(|| SchedulingError::not_found("appointment", appointment_id))
    }

    /// Best effort: the reassignment is already committed, so failures are only logged.
    fn notify_assignment(&self, appointment: &Appointment) {
        let notice = TechnicianNotice {
            recipient: appointment.technician_id.clone(),
            message: format!(
                "You have been assigned to {} on {} at {}",
                appointment.client.name, appointment.date, appointment.slot
            ),
            link: format!(
                "{}/technician/appointments/{}",
                self.public_url.trim_end_matches('/'),
                appointment.id
            ),
        };

        if let Err(err) = self.notifier.notify(notice) {
            warn!(
                appointment = %appointment.id,
                technician = %appointment.technician_id,
                error = %err,
                "assignment notification failed"
            );
        }
    }
}
