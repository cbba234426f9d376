use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fieldops::scheduling::{
    AdminRequestKind, AppointmentStatus, AssignmentStore, BookingRequest, ClientInfo, Clock,
    ContactDetails, DeliveryError, IncidentOutcome, IncidentReport, InMemorySchedulingStore,
    LeaveStatus, LeaveSubmission, LeaveType, Mailer, Notifier, ProjectId, RescheduleChoice,
    RescheduleEmail, Scheduler, SchedulerSettings, SchedulingError, Technician, TechnicianId,
    TechnicianNotice, TimeSlot, TokenRejection, UserId, WorkingHours,
};

struct ManualClock(Mutex<DateTime<Utc>>);

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default)]
struct Outbox {
    notices: Mutex<Vec<TechnicianNotice>>,
    emails: Mutex<Vec<RescheduleEmail>>,
}

impl Notifier for Outbox {
    fn notify(&self, notice: TechnicianNotice) -> Result<(), DeliveryError> {
        self.notices.lock().expect("outbox poisoned").push(notice);
        Ok(())
    }
}

impl Mailer for Outbox {
    fn send_reschedule_link(&self, email: RescheduleEmail) -> Result<(), DeliveryError> {
        self.emails.lock().expect("outbox poisoned").push(email);
        Ok(())
    }
}

fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 24).expect("valid date")
}

fn at(hour: u32) -> TimeSlot {
    TimeSlot::from_hm(hour, 0).expect("valid slot")
}

fn crew_member(id: &str, name: &str) -> Technician {
    Technician {
        id: TechnicianId::new(id),
        name: name.to_string(),
        contact: ContactDetails::default(),
        specialties: BTreeSet::new(),
        active: true,
        working_hours: WorkingHours::default(),
        vacation_quota_days: 20,
    }
}

fn scheduler() -> (
    Arc<Scheduler<InMemorySchedulingStore, Outbox, Outbox>>,
    Arc<InMemorySchedulingStore>,
    Arc<Outbox>,
    Arc<ManualClock>,
) {
    let store = Arc::new(InMemorySchedulingStore::default());
    let outbox = Arc::new(Outbox::default());
    let clock = Arc::new(ManualClock(Mutex::new(
        Utc.with_ymd_and_hms(2025, 9, 20, 8, 30, 0)
            .single()
            .expect("valid instant"),
    )));
    let scheduler = Arc::new(Scheduler::with_clock(
        store.clone(),
        outbox.clone(),
        outbox.clone(),
        SchedulerSettings::default(),
        clock.clone(),
    ));

    for (id, name) in [("tech-1", "Ines"), ("tech-2", "Jamal"), ("tech-3", "Kai")] {
        scheduler
            .roster()
            .register_technician(crew_member(id, name))
            .expect("technician registered");
    }
    (scheduler, store, outbox, clock)
}

fn request(project: &str, technician_id: &str, hour: u32) -> BookingRequest {
    BookingRequest {
        project_id: ProjectId::new(project),
        technician_id: TechnicianId::new(technician_id),
        date: wednesday(),
        slot: at(hour),
        client: ClientInfo {
            name: "Lena Fischer".to_string(),
            address: "Am Markt 3".to_string(),
            phone: Some("+49 30 1234".to_string()),
            email: Some("lena@example.test".to_string()),
        },
        notes: String::new(),
    }
}

#[test]
fn visit_survives_absence_incident_and_customer_reschedule() {
    let (scheduler, store, outbox, clock) = scheduler();

    // tech-2 is away on the visit date, so the incident must fall through to tech-3
    let leave = scheduler
        .roster()
        .request_leave(
            &TechnicianId::new("tech-2"),
            LeaveSubmission {
                start_date: wednesday(),
                end_date: wednesday(),
                leave_type: LeaveType::Sickness,
                reason: String::new(),
            },
        )
        .expect("leave filed");
    scheduler
        .roster()
        .decide_leave(&leave.id, LeaveStatus::Approved)
        .expect("leave approved");

    let visit = scheduler
        .booking()
        .book(request("proj-heatpump", "tech-1", 10))
        .expect("booked");
    scheduler
        .lifecycle()
        .set_status(&visit.id, AppointmentStatus::InProgress)
        .expect("checked in");

    let outcome = scheduler
        .incidents()
        .report_incident(
            &visit.id,
            IncidentReport {
                reason: "illness".to_string(),
                comment: String::new(),
                reporter_id: UserId::new("user-ines"),
            },
        )
        .expect("incident handled");
    match outcome {
        IncidentOutcome::Reassigned {
            new_technician_id, ..
        } => assert_eq!(new_technician_id, TechnicianId::new("tech-3")),
        other => panic!("expected reassignment, got {other:?}"),
    }
    let audit = scheduler
        .incidents()
        .requests_for(&visit.id)
        .expect("requests listed");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].kind(), AdminRequestKind::IncidentReport);

    let token = scheduler
        .reschedule()
        .issue_token(&visit.id, &UserId::new("user-dispatch"))
        .expect("link issued");
    assert_eq!(outbox.emails.lock().expect("outbox").len(), 1);

    *clock.0.lock().expect("clock") += Duration::hours(2);
    let thursday = wednesday().succ_opt().expect("valid date");
    let moved = scheduler
        .reschedule()
        .redeem(
            &token.token,
            RescheduleChoice {
                date: thursday,
                slot: at(15),
                technician_id: TechnicianId::new("tech-2"),
            },
        )
        .expect("rescheduled");
    assert_eq!(moved.date, thursday);
    assert_eq!(moved.technician_id, TechnicianId::new("tech-2"));
    // the check-in from before the incident was cleared by the reassignment
    assert!(moved.check_in_time.is_none());

    let project = store
        .fetch_project(&ProjectId::new("proj-heatpump"))
        .expect("store reachable")
        .expect("project exists");
    assert_eq!(
        project.assigned_to,
        BTreeSet::from([TechnicianId::new("tech-2")])
    );
    assert!(project.scheduled_at(thursday, at(15)));

    let reuse = scheduler.reschedule().validate(&token.token);
    assert!(matches!(
        reuse,
        Err(SchedulingError::Token(TokenRejection::AlreadyUsed))
    ));

    let open_wednesday = scheduler
        .availability()
        .list_open_slots(wednesday())
        .expect("open slots");
    assert_eq!(open_wednesday.len(), 8);
    assert_eq!(outbox.notices.lock().expect("outbox").len(), 1);
}

#[test]
fn full_slot_escalates_the_incident() {
    let (scheduler, _store, outbox, _clock) = scheduler();
    let mut last = None;
    for (n, technician_id) in ["tech-1", "tech-2", "tech-3"].into_iter().enumerate() {
        last = Some(
            scheduler
                .booking()
                .book(request(&format!("proj-{n}"), technician_id, 11))
                .expect("booked"),
        );
    }
    let stranded = last.expect("three bookings made");

    let open = scheduler
        .availability()
        .list_open_slots(wednesday())
        .expect("open slots");
    assert!(!open.contains(&at(11)));

    let outcome = scheduler
        .incidents()
        .report_incident(
            &stranded.id,
            IncidentReport {
                reason: "van stolen".to_string(),
                comment: "police report filed".to_string(),
                reporter_id: UserId::new("user-kai"),
            },
        )
        .expect("incident handled");
    assert!(matches!(outcome, IncidentOutcome::RequestCreated { .. }));

    let requests = scheduler
        .incidents()
        .requests_for(&stranded.id)
        .expect("requests listed");
    assert_eq!(requests[0].kind(), AdminRequestKind::RescheduleRequest);
    assert!(outbox.notices.lock().expect("outbox").is_empty());
}
