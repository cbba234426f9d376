use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    ActiveProject, AdminRequest, Appointment, AppointmentId, AppointmentStatus, LeaveRequest,
    LeaveRequestId, LeaveStatus, ProjectId, RescheduleToken, Technician, TechnicianId, TimeSlot,
    TokenRejection,
};
use super::repository::{
    AdminRequestLog, AssignmentStore, LeaveLedger, Reassignment, RedemptionError,
    RepositoryError, TechnicianDirectory, TokenRedemption, TokenStore,
};

/// Process-local store guarding every table with one lock, so each trait method is a single
/// transaction and the conditional writes cannot interleave.
#[derive(Default, Clone)]
pub struct InMemorySchedulingStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    technicians: BTreeMap<TechnicianId, Technician>,
    leave: BTreeMap<LeaveRequestId, LeaveRequest>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    projects: BTreeMap<ProjectId, ActiveProject>,
    tokens: HashMap<String, RescheduleToken>,
    admin_requests: Vec<AdminRequest>,
}

/// Booking being placed; the excluded records are the ones the write itself moves.
struct Placement<'a> {
    technician_id: &'a TechnicianId,
    date: NaiveDate,
    slot: TimeSlot,
    appointment: Option<&'a AppointmentId>,
    project: Option<&'a ProjectId>,
}

impl StoreState {
    fn ensure_bookable(&self, placement: &Placement<'_>) -> Result<(), RepositoryError> {
        let technician = self
            .technicians
            .get(placement.technician_id)
            .ok_or_else(|| RepositoryError::not_found("technician", placement.technician_id))?;
        if !technician.active {
            return Err(RepositoryError::Conflict(format!(
                "technician {} is inactive",
                technician.id
            )));
        }

        let on_leave = self
            .leave
            .values()
            .any(|leave| &leave.technician_id == placement.technician_id && leave.blocks(placement.date));
        if on_leave {
            return Err(RepositoryError::Conflict(format!(
                "technician {} is on approved leave on {}",
                placement.technician_id, placement.date
            )));
        }

        let appointment_clash = self.appointments.values().any(|appointment| {
            Some(&appointment.id) != placement.appointment
                && &appointment.technician_id == placement.technician_id
                && appointment.occupies(placement.date, placement.slot)
        });
        let project_clash = self.projects.values().any(|project| {
            Some(&project.id) != placement.project
                && project.scheduled_at(placement.date, placement.slot)
                && project.assigned_to.contains(placement.technician_id)
        });
        if appointment_clash || project_clash {
            return Err(RepositoryError::Conflict(format!(
                "technician {} is already booked on {} at {}",
                placement.technician_id, placement.date, placement.slot
            )));
        }

        Ok(())
    }

    /// Puts `next` on the project at `date`/`slot` in place of `previous`. A project still
    /// carrying other technicians keeps its schedule, so only a move to that same date and
    /// slot is accepted.
    fn claim_project(
        &mut self,
        project_id: &ProjectId,
        previous: Option<&TechnicianId>,
        next: &TechnicianId,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<(), RepositoryError> {
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| RepositoryError::not_found("project", project_id))?;

        let co_assigned = project
            .assigned_to
            .iter()
            .any(|id| Some(id) != previous && id != next);
        if co_assigned && !project.scheduled_at(date, slot) {
            return Err(RepositoryError::Conflict(format!(
                "project {project_id} is scheduled elsewhere for its other technicians"
            )));
        }

        project.replace_technician(previous, next.clone());
        project.date = Some(date);
        project.slot = Some(slot);
        Ok(())
    }

    /// Takes a cancelled appointment's technician off its project.
    fn release_project(&mut self, appointment: &Appointment) {
        if let Some(project) = self.projects.get_mut(&appointment.project_id) {
            if project.scheduled_at(appointment.date, appointment.slot) {
                project.assigned_to.remove(&appointment.technician_id);
            }
        }
    }
}

impl InMemorySchedulingStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    /// Registers a project record owned by the wider portal.
    pub fn upsert_project(&self, project: ActiveProject) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state.projects.insert(project.id.clone(), project);
        Ok(())
    }
}

impl TechnicianDirectory for InMemorySchedulingStore {
    fn insert_technician(&self, technician: Technician) -> Result<Technician, RepositoryError> {
        let mut state = self.state()?;
        if state.technicians.contains_key(&technician.id) {
            return Err(RepositoryError::Conflict(format!(
                "technician {} already exists",
                technician.id
            )));
        }
        state
            .technicians
            .insert(technician.id.clone(), technician.clone());
        Ok(technician)
    }

    fn update_technician(&self, technician: Technician) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.technicians.get_mut(&technician.id) {
            Some(existing) => {
                *existing = technician;
                Ok(())
            }
            None => Err(RepositoryError::not_found("technician", &technician.id)),
        }
    }

    fn fetch_technician(&self, id: &TechnicianId) -> Result<Option<Technician>, RepositoryError> {
        Ok(self.state()?.technicians.get(id).cloned())
    }

    fn technicians(&self) -> Result<Vec<Technician>, RepositoryError> {
        Ok(self.state()?.technicians.values().cloned().collect())
    }

    fn remove_technician(&self, id: &TechnicianId) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.technicians.contains_key(id) {
            return Err(RepositoryError::not_found("technician", id));
        }
        if state
            .appointments
            .values()
            .any(|appointment| &appointment.technician_id == id)
        {
            return Err(RepositoryError::Conflict(format!(
                "technician {id} is referenced by appointments"
            )));
        }
        state.leave.retain(|_, leave| &leave.technician_id != id);
        state.technicians.remove(id);
        Ok(())
    }
}

impl LeaveLedger for InMemorySchedulingStore {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.state()?;
        if !state.technicians.contains_key(&leave.technician_id) {
            return Err(RepositoryError::not_found(
                "technician",
                &leave.technician_id,
            ));
        }
        if state.leave.contains_key(&leave.id) {
            return Err(RepositoryError::Conflict(format!(
                "leave request {} already exists",
                leave.id
            )));
        }
        state.leave.insert(leave.id.clone(), leave.clone());
        Ok(leave)
    }

    fn fetch_leave(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        Ok(self.state()?.leave.get(id).cloned())
    }

    fn transition_leave(
        &self,
        id: &LeaveRequestId,
        expected: LeaveStatus,
        next: LeaveStatus,
    ) -> Result<LeaveRequest, RepositoryError> {
        let mut state = self.state()?;
        let leave = state
            .leave
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("leave request", id))?;
        if leave.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "leave request {id} is {} rather than {}",
                leave.status.label(),
                expected.label()
            )));
        }
        leave.status = next;
        Ok(leave.clone())
    }

    fn leave_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state()?;
        let mut records: Vec<LeaveRequest> = state
            .leave
            .values()
            .filter(|leave| &leave.technician_id == technician_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(records)
    }

    fn approved_leave_on(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .leave
            .values()
            .filter(|leave| leave.blocks(date))
            .cloned()
            .collect())
    }
}

impl AssignmentStore for InMemorySchedulingStore {
    fn fetch_appointment(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.state()?.appointments.get(id).cloned())
    }

    fn fetch_project(&self, id: &ProjectId) -> Result<Option<ActiveProject>, RepositoryError> {
        Ok(self.state()?.projects.get(id).cloned())
    }

    fn appointments_at(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .appointments
            .values()
            .filter(|appointment| appointment.occupies(date, slot))
            .cloned()
            .collect())
    }

    fn projects_at(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<Vec<ActiveProject>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .projects
            .values()
            .filter(|project| project.scheduled_at(date, slot))
            .cloned()
            .collect())
    }

    fn book(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut state = self.state()?;
        if state.appointments.contains_key(&appointment.id) {
            return Err(RepositoryError::Conflict(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        state.ensure_bookable(&Placement {
            technician_id: &appointment.technician_id,
            date: appointment.date,
            slot: appointment.slot,
            appointment: None,
            project: Some(&appointment.project_id),
        })?;

        state
            .projects
            .entry(appointment.project_id.clone())
            .or_insert_with(|| ActiveProject::unscheduled(appointment.project_id.clone()));
        state.claim_project(
            &appointment.project_id,
            None,
            &appointment.technician_id,
            appointment.date,
            appointment.slot,
        )?;

        state
            .appointments
            .insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    fn set_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, RepositoryError> {
        let mut state = self.state()?;
        let current = state
            .appointments
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("appointment", id))?;

        let was_cancelled = current.status == AppointmentStatus::Cancelled;
        let cancelling = status == AppointmentStatus::Cancelled;
        if was_cancelled && !cancelling {
            state.ensure_bookable(&Placement {
                technician_id: &current.technician_id,
                date: current.date,
                slot: current.slot,
                appointment: Some(&current.id),
                project: Some(&current.project_id),
            })?;
            state.claim_project(
                &current.project_id,
                None,
                &current.technician_id,
                current.date,
                current.slot,
            )?;
        } else if cancelling && !was_cancelled {
            state.release_project(&current);
        }

        let mut updated = current;
        updated.enter(status, now);
        state
            .appointments
            .insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    fn modify_appointment(
        &self,
        id: &AppointmentId,
        change: &mut dyn FnMut(&mut Appointment),
    ) -> Result<Appointment, RepositoryError> {
        let mut state = self.state()?;
        let appointment = state
            .appointments
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("appointment", id))?;
        change(appointment);
        Ok(appointment.clone())
    }

    fn reassign(&self, change: Reassignment) -> Result<Appointment, RepositoryError> {
        let mut state = self.state()?;
        let current = state
            .appointments
            .get(&change.appointment_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("appointment", &change.appointment_id))?;
        state.ensure_bookable(&Placement {
            technician_id: &change.new_technician_id,
            date: current.date,
            slot: current.slot,
            appointment: Some(&current.id),
            project: Some(&change.project_id),
        })?;

        state.claim_project(
            &change.project_id,
            Some(&current.technician_id),
            &change.new_technician_id,
            current.date,
            current.slot,
        )?;

        let mut updated = current;
        updated.technician_id = change.new_technician_id;
        updated.status = AppointmentStatus::Scheduled;
        updated.check_in_time = None;
        updated.check_out_time = None;
        state
            .appointments
            .insert(updated.id.clone(), updated.clone());

        if let Some(audit) = change.audit {
            state.admin_requests.push(audit);
        }

        Ok(updated)
    }
}

impl TokenStore for InMemorySchedulingStore {
    fn insert_token(&self, token: RescheduleToken) -> Result<RescheduleToken, RepositoryError> {
        let mut state = self.state()?;
        if state.tokens.contains_key(&token.token) {
            return Err(RepositoryError::Conflict("token collision".to_string()));
        }
        state.tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    fn fetch_token(&self, token: &str) -> Result<Option<RescheduleToken>, RepositoryError> {
        Ok(self.state()?.tokens.get(token).cloned())
    }

    fn redeem_token(&self, redemption: TokenRedemption) -> Result<Appointment, RedemptionError> {
        let mut state = self.state()?;
        let token = state
            .tokens
            .get(&redemption.token)
            .cloned()
            .ok_or(TokenRejection::Unknown)?;
        token.check(redemption.now)?;

        let current = state
            .appointments
            .get(&token.appointment_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("appointment", &token.appointment_id))?;
        state.ensure_bookable(&Placement {
            technician_id: &redemption.technician_id,
            date: redemption.date,
            slot: redemption.slot,
            appointment: Some(&current.id),
            project: Some(&current.project_id),
        })?;

        state.claim_project(
            &current.project_id,
            Some(&current.technician_id),
            &redemption.technician_id,
            redemption.date,
            redemption.slot,
        )?;

        let mut updated = current;
        updated.date = redemption.date;
        updated.slot = redemption.slot;
        updated.technician_id = redemption.technician_id;
        updated.status = AppointmentStatus::Scheduled;
        state
            .appointments
            .insert(updated.id.clone(), updated.clone());

        if let Some(stored) = state.tokens.get_mut(&redemption.token) {
            stored.used_at = Some(redemption.now);
        }

        Ok(updated)
    }
}

impl AdminRequestLog for InMemorySchedulingStore {
    fn insert_admin_request(&self, request: AdminRequest) -> Result<AdminRequest, RepositoryError> {
        let mut state = self.state()?;
        state.admin_requests.push(request.clone());
        Ok(request)
    }

    fn admin_requests_for(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Vec<AdminRequest>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .admin_requests
            .iter()
            .filter(|request| &request.appointment_id == appointment_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::domain::{ClientInfo, UserId, WorkingHours};
    use chrono::Duration;

    fn store_with_visit() -> (InMemorySchedulingStore, Appointment) {
        let store = InMemorySchedulingStore::default();
        for id in ["tech-a", "tech-b"] {
            store
                .insert_technician(Technician {
                    id: TechnicianId::new(id),
                    name: id.to_string(),
                    contact: Default::default(),
                    specialties: Default::default(),
                    active: true,
                    working_hours: WorkingHours::default(),
                    vacation_quota_days: 25,
                })
                .expect("technician inserted");
        }
        let appointment = store
            .book(Appointment {
                id: AppointmentId::new("appt-1"),
                technician_id: TechnicianId::new("tech-a"),
                project_id: ProjectId::new("proj-1"),
                date: NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date"),
                slot: TimeSlot::from_hm(9, 0).expect("valid slot"),
                status: AppointmentStatus::Scheduled,
                notes: String::new(),
                client: ClientInfo::default(),
                photos: Vec::new(),
                check_in_time: None,
                check_out_time: None,
            })
            .expect("appointment booked");
        (store, appointment)
    }

    #[test]
    fn redeeming_without_a_project_record_is_not_found() {
        let (store, appointment) = store_with_visit();
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000);
        store
            .insert_token(RescheduleToken {
                token: "abc123".to_string(),
                appointment_id: appointment.id.clone(),
                issued_by: UserId::new("user-admin"),
                created_at: now,
                expires_at: now + Duration::hours(48),
                used_at: None,
            })
            .expect("token stored");
        store
            .state()
            .expect("lock held")
            .projects
            .remove(&appointment.project_id);

        let result = store.redeem_token(TokenRedemption {
            token: "abc123".to_string(),
            now,
            date: appointment.date,
            slot: TimeSlot::from_hm(10, 0).expect("valid slot"),
            technician_id: TechnicianId::new("tech-b"),
        });
        match result {
            Err(RedemptionError::Repository(RepositoryError::NotFound { entity, .. })) => {
                assert_eq!(entity, "project")
            }
            other => panic!("expected missing project, got {other:?}"),
        }

        let token = store
            .fetch_token("abc123")
            .expect("store reachable")
            .expect("token kept");
        assert!(token.used_at.is_none());
        let unchanged = store
            .fetch_appointment(&appointment.id)
            .expect("store reachable")
            .expect("appointment kept");
        assert_eq!(unchanged.technician_id, TechnicianId::new("tech-a"));
    }
}
