use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType, Technician, TechnicianId,
};
use super::error::SchedulingError;
use super::repository::{LeaveLedger, TechnicianDirectory};

static LEAVE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_leave_id() -> LeaveRequestId {
    let id = LEAVE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeaveRequestId(format!("leave-{id:06}"))
}

/// Time off requested by a technician or entered by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveSubmission {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    #[serde(default)]
    pub reason: String,
}

/// Informational vacation usage for one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VacationBalance {
    pub technician_id: TechnicianId,
    pub year: i32,
    pub quota_days: u16,
    pub used_days: i64,
    pub remaining_days: i64,
}

/// Technician directory and leave ledger management.
pub struct RosterService<S> {
    store: Arc<S>,
}

impl<S> RosterService<S>
where
    S: TechnicianDirectory + LeaveLedger + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register_technician(&self, technician: Technician) -> Result<Technician, SchedulingError> {
        let stored = self.store.insert_technician(technician)?;
        info!(technician = %stored.id, "technician registered");
        Ok(stored)
    }

    pub fn update_technician(&self, technician: Technician) -> Result<Technician, SchedulingError> {
        self.store.update_technician(technician.clone())?;
        Ok(technician)
    }

    /// Inactive technicians disappear from every availability query.
    pub fn set_active(&self, id: &TechnicianId, active: bool) -> Result<Technician, SchedulingError> {
        let mut technician = self.get_technician(id)?;
        technician.active = active;
        self.store.update_technician(technician.clone())?;
        info!(technician = %id, active, "technician activation changed");
        Ok(technician)
    }

    pub fn get_technician(&self, id: &TechnicianId) -> Result<Technician, SchedulingError> {
        self.store
            .fetch_technician(id)?
            .ok_or_else(|| SchedulingError::not_found("technician", id))
    }

    pub fn list_technicians(&self) -> Result<Vec<Technician>, SchedulingError> {
        Ok(self.store.technicians()?)
    }

    pub fn remove_technician(&self, id: &TechnicianId) -> Result<(), SchedulingError> {
        self.store.remove_technician(id)?;
        info!(technician = %id, "technician removed");
        Ok(())
    }

    /// File a pending leave request awaiting admin decision.
    pub fn request_leave(
        &self,
        technician_id: &TechnicianId,
        submission: LeaveSubmission,
    ) -> Result<LeaveRequest, SchedulingError> {
        self.insert_leave(technician_id, submission, LeaveStatus::Pending)
    }

    /// Self-declared absence: recorded as unplanned leave that is approved on creation.
    pub fn declare_absence(
        &self,
        technician_id: &TechnicianId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
    ) -> Result<LeaveRequest, SchedulingError> {
        let submission = LeaveSubmission {
            start_date,
            end_date,
            leave_type: LeaveType::Unplanned,
            reason,
        };
        self.insert_leave(technician_id, submission, LeaveStatus::Approved)
    }

    /// Admin decision on a leave request.
    pub fn decide_leave(
        &self,
        id: &LeaveRequestId,
        next: LeaveStatus,
    ) -> Result<LeaveRequest, SchedulingError> {
        let current = self
            .store
            .fetch_leave(id)?
            .ok_or_else(|| SchedulingError::not_found("leave request", id))?;
        if !current.status.can_become(next) {
            return Err(SchedulingError::Invalid(format!(
                "leave request {id} cannot move from {} to {}",
                current.status.label(),
                next.label()
            )));
        }

        let updated = self.store.transition_leave(id, current.status, next)?;
        info!(leave = %id, status = next.label(), "leave request decided");
        Ok(updated)
    }

    pub fn leave_for(&self, technician_id: &TechnicianId) -> Result<Vec<LeaveRequest>, SchedulingError> {
        Ok(self.store.leave_for_technician(technician_id)?)
    }

    pub fn vacation_balance(
        &self,
        technician_id: &TechnicianId,
        year: i32,
    ) -> Result<VacationBalance, SchedulingError> {
        let technician = self.get_technician(technician_id)?;
        let used_days: i64 = self
            .store
            .leave_for_technician(technician_id)?
            .iter()
            .filter(|leave| {
                leave.status == LeaveStatus::Approved && leave.leave_type == LeaveType::Vacation
            })
            .map(|leave| leave.days_in_year(year))
            .sum();
        let quota_days = technician.vacation_quota_days;

        Ok(VacationBalance {
            technician_id: technician.id,
            year,
            quota_days,
            used_days,
            remaining_days: i64::from(quota_days) - used_days,
        })
    }

    fn insert_leave(
        &self,
        technician_id: &TechnicianId,
        submission: LeaveSubmission,
        status: LeaveStatus,
    ) -> Result<LeaveRequest, SchedulingError> {
        if submission.end_date < submission.start_date {
            return Err(SchedulingError::Invalid(format!(
                "leave ends ({}) before it starts ({})",
                submission.end_date, submission.start_date
            )));
        }

        let leave = LeaveRequest {
            id: next_leave_id(),
            technician_id: technician_id.clone(),
            start_date: submission.start_date,
            end_date: submission.end_date,
            status,
            leave_type: submission.leave_type,
            reason: submission.reason,
        };
        let stored = self.store.insert_leave(leave)?;
        info!(
            leave = %stored.id,
            technician = %technician_id,
            status = stored.status.label(),
            "leave recorded"
        );
        Ok(stored)
    }
}
