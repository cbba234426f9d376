use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActiveProject, AdminRequest, Appointment, AppointmentId, AppointmentStatus, LeaveRequest,
    LeaveRequestId, LeaveStatus, ProjectId, RescheduleToken, Technician, TechnicianId, TimeSlot,
    TokenRejection,
};

/// Directory of technicians. Entries are never hard-deleted while appointments reference them.
pub trait TechnicianDirectory: Send + Sync {
    fn insert_technician(&self, technician: Technician) -> Result<Technician, RepositoryError>;
    fn update_technician(&self, technician: Technician) -> Result<(), RepositoryError>;
    fn fetch_technician(&self, id: &TechnicianId) -> Result<Option<Technician>, RepositoryError>;
    /// All technicians ordered by identifier.
    fn technicians(&self) -> Result<Vec<Technician>, RepositoryError>;
    /// Removes the technician and their leave records; fails with `Conflict` while any
    /// appointment still references them.
    fn remove_technician(&self, id: &TechnicianId) -> Result<(), RepositoryError>;
}

/// Time-off records consulted by every availability query.
pub trait LeaveLedger: Send + Sync {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError>;
    fn fetch_leave(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError>;
    /// Conditional status write: only applied while the stored status equals `expected`.
    fn transition_leave(
        &self,
        id: &LeaveRequestId,
        expected: LeaveStatus,
        next: LeaveStatus,
    ) -> Result<LeaveRequest, RepositoryError>;
    fn leave_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError>;
    /// Approved leave whose inclusive range contains `date`.
    fn approved_leave_on(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, RepositoryError>;
}

/// Owner of the "who is busy when" fact: appointments and their projects' assignments.
///
/// Every write that places a technician on a slot is conditional: the store rejects it with
/// `Conflict` when the technician is already booked at that date and slot or is on approved
/// leave, so concurrent bookings cannot both win.
pub trait AssignmentStore: Send + Sync {
    fn fetch_appointment(&self, id: &AppointmentId)
        -> Result<Option<Appointment>, RepositoryError>;
    fn fetch_project(&self, id: &ProjectId) -> Result<Option<ActiveProject>, RepositoryError>;
    /// Non-cancelled appointments at exactly `date` and `slot`.
    fn appointments_at(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<Vec<Appointment>, RepositoryError>;
    fn projects_at(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<Vec<ActiveProject>, RepositoryError>;
    /// Inserts the appointment and adds its technician to the project (registering the
    /// project when unknown).
    fn book(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;
    /// Status write that keeps the project assignment in step: cancelling takes the
    /// technician off the project, and leaving `cancelled` re-checks and re-claims the slot.
    fn set_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, RepositoryError>;
    /// Read-modify-write of a single appointment, applied atomically.
    fn modify_appointment(
        &self,
        id: &AppointmentId,
        change: &mut dyn FnMut(&mut Appointment),
    ) -> Result<Appointment, RepositoryError>;
    /// Moves the appointment and its project to a new technician in one transaction, recording
    /// the optional audit entry alongside.
    fn reassign(&self, change: Reassignment) -> Result<Appointment, RepositoryError>;
}

/// Persistence of reschedule capabilities.
pub trait TokenStore: Send + Sync {
    fn insert_token(&self, token: RescheduleToken) -> Result<RescheduleToken, RepositoryError>;
    fn fetch_token(&self, token: &str) -> Result<Option<RescheduleToken>, RepositoryError>;
    /// Validates the token, applies the reschedule and sets `used_at` as one atomic step.
    /// Concurrent callers for the same token observe exactly one success.
    fn redeem_token(&self, redemption: TokenRedemption) -> Result<Appointment, RedemptionError>;
}

/// Append-only audit/escalation trail.
pub trait AdminRequestLog: Send + Sync {
    fn insert_admin_request(&self, request: AdminRequest) -> Result<AdminRequest, RepositoryError>;
    fn admin_requests_for(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Vec<AdminRequest>, RepositoryError>;
}

/// Everything the scheduling services need from storage.
pub trait SchedulingStore:
    TechnicianDirectory + LeaveLedger + AssignmentStore + TokenStore + AdminRequestLog
{
}

impl<T> SchedulingStore for T where
    T: TechnicianDirectory + LeaveLedger + AssignmentStore + TokenStore + AdminRequestLog
{
}

/// Technician swap applied by [`AssignmentStore::reassign`].
#[derive(Debug, Clone)]
pub struct Reassignment {
    pub appointment_id: AppointmentId,
    pub project_id: ProjectId,
    pub new_technician_id: TechnicianId,
    pub audit: Option<AdminRequest>,
}

/// New date, slot and technician requested through a reschedule link.
#[derive(Debug, Clone)]
pub struct TokenRedemption {
    pub token: String,
    pub now: DateTime<Utc>,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub technician_id: TechnicianId,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedemptionError {
    #[error(transparent)]
    Rejected(#[from] TokenRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outbound hook for technician messages (push, SMS or in-app adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: TechnicianNotice) -> Result<(), DeliveryError>;
}

/// Outbound hook for customer e-mail.
pub trait Mailer: Send + Sync {
    fn send_reschedule_link(&self, email: RescheduleEmail) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianNotice {
    pub recipient: TechnicianId,
    pub message: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleEmail {
    pub recipient: Option<String>,
    pub customer_name: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Notification or e-mail dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
    #[error("recipient missing: {0}")]
    MissingRecipient(String),
}
