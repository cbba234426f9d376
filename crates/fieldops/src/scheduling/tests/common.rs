use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::scheduling::booking::BookingRequest;
use crate::scheduling::clock::Clock;
use crate::scheduling::domain::{
    Appointment, ClientInfo, ContactDetails, LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType,
    ProjectId, Technician, TechnicianId, TimeSlot, WorkingHours,
};
use crate::scheduling::memory::InMemorySchedulingStore;
use crate::scheduling::repository::{
    DeliveryError, LeaveLedger, Mailer, Notifier, RescheduleEmail, TechnicianDirectory,
    TechnicianNotice,
};
use crate::scheduling::reschedule::EmailPolicy;
use crate::scheduling::service::{Scheduler, SchedulerSettings};

pub(super) type TestScheduler = Scheduler<InMemorySchedulingStore, RecordingNotifier, RecordingMailer>;

/// Monday.
pub(super) fn visit_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date")
}

pub(super) fn slot(hour: u32) -> TimeSlot {
    TimeSlot::from_hm(hour, 0).expect("valid slot")
}

pub(super) fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 30, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn technician(id: &str, name: &str) -> Technician {
    Technician {
        id: TechnicianId::new(id),
        name: name.to_string(),
        contact: ContactDetails {
            email: Some(format!("{id}@fieldops.test")),
            phone: None,
        },
        specialties: BTreeSet::from(["solar".to_string()]),
        active: true,
        working_hours: WorkingHours::default(),
        vacation_quota_days: 25,
    }
}

pub(super) fn approved_leave(id: &str, technician_id: &str, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
    LeaveRequest {
        id: LeaveRequestId::new(id),
        technician_id: TechnicianId::new(technician_id),
        start_date: start,
        end_date: end,
        status: LeaveStatus::Approved,
        leave_type: LeaveType::Vacation,
        reason: String::new(),
    }
}

pub(super) fn seeded_store(technicians: &[(&str, &str)]) -> Arc<InMemorySchedulingStore> {
    let store = Arc::new(InMemorySchedulingStore::default());
    for (id, name) in technicians {
        store
            .insert_technician(technician(id, name))
            .expect("technician inserted");
    }
    store
}

pub(super) fn grant_leave(store: &InMemorySchedulingStore, leave: LeaveRequest) {
    store.insert_leave(leave).expect("leave inserted");
}

pub(super) fn booking(project: &str, technician_id: &str, date: NaiveDate, at: TimeSlot) -> BookingRequest {
    BookingRequest {
        project_id: ProjectId::new(project),
        technician_id: TechnicianId::new(technician_id),
        date,
        slot: at,
        client: ClientInfo {
            name: "Marta Ruiz".to_string(),
            address: "Calle Mayor 4".to_string(),
            phone: None,
            email: Some("marta@example.test".to_string()),
        },
        notes: "roof survey".to_string(),
    }
}

pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<TechnicianNotice>>,
    failing: bool,
}

impl RecordingNotifier {
    pub(super) fn failing() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub(super) fn notices(&self) -> Vec<TechnicianNotice> {
        self.notices.lock().expect("notices mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: TechnicianNotice) -> Result<(), DeliveryError> {
        if self.failing {
            return Err(DeliveryError::Transport("push gateway offline".to_string()));
        }
        self.notices
            .lock()
            .expect("notices mutex poisoned")
            .push(notice);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    emails: Mutex<Vec<RescheduleEmail>>,
    failing: bool,
}

impl RecordingMailer {
    pub(super) fn failing() -> Self {
        Self {
            emails: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub(super) fn emails(&self) -> Vec<RescheduleEmail> {
        self.emails.lock().expect("emails mutex poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send_reschedule_link(&self, email: RescheduleEmail) -> Result<(), DeliveryError> {
        if self.failing {
            return Err(DeliveryError::Transport("smtp relay refused".to_string()));
        }
        self.emails.lock().expect("emails mutex poisoned").push(email);
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemorySchedulingStore>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) scheduler: Arc<TestScheduler>,
}

pub(super) fn harness(technicians: &[(&str, &str)]) -> Harness {
    harness_with(
        seeded_store(technicians),
        RecordingNotifier::default(),
        RecordingMailer::default(),
        EmailPolicy::Required,
    )
}

pub(super) fn harness_with(
    store: Arc<InMemorySchedulingStore>,
    notifier: RecordingNotifier,
    mailer: RecordingMailer,
    email_policy: EmailPolicy,
) -> Harness {
    let notifier = Arc::new(notifier);
    let mailer = Arc::new(mailer);
    let clock = Arc::new(FixedClock::at(start_instant()));

    let mut settings = SchedulerSettings::default();
    settings.reschedule.public_url = "https://portal.fieldops.test/".to_string();
    settings.reschedule.email_policy = email_policy;

    let scheduler = Arc::new(Scheduler::with_clock(
        store.clone(),
        notifier.clone(),
        mailer.clone(),
        settings,
        clock.clone(),
    ));

    Harness {
        store,
        notifier,
        mailer,
        clock,
        scheduler,
    }
}

impl Harness {
    pub(super) fn book(&self, project: &str, technician_id: &str, at: TimeSlot) -> Appointment {
        self.scheduler
            .booking()
            .book(booking(project, technician_id, visit_date(), at))
            .expect("booking succeeds")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
