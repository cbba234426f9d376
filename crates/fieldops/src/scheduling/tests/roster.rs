use chrono::NaiveDate;

use super::common::*;
use crate::scheduling::domain::{LeaveStatus, LeaveType, TechnicianId};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::roster::LeaveSubmission;

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
}

fn vacation(start: NaiveDate, end: NaiveDate) -> LeaveSubmission {
    LeaveSubmission {
        start_date: start,
        end_date: end,
        leave_type: LeaveType::Vacation,
        reason: "summer".to_string(),
    }
}

#[test]
fn leave_only_blocks_once_approved() {
    let h = harness(&[("tech-a", "Ana")]);
    let roster = h.scheduler.roster();
    let tech = TechnicianId::new("tech-a");

    let leave = roster
        .request_leave(&tech, vacation(visit_date(), visit_date()))
        .expect("leave filed");
    assert_eq!(leave.status, LeaveStatus::Pending);
    assert_eq!(
        h.scheduler
            .availability()
            .find_available(visit_date(), slot(9), None)
            .expect("query")
            .len(),
        1
    );

    roster
        .decide_leave(&leave.id, LeaveStatus::Approved)
        .expect("approved");
    assert!(h
        .scheduler
        .availability()
        .find_available(visit_date(), slot(9), None)
        .expect("query")
        .is_empty());

    roster
        .decide_leave(&leave.id, LeaveStatus::Cancelled)
        .expect("withdrawn");
    assert_eq!(
        h.scheduler
            .availability()
            .find_available(visit_date(), slot(9), None)
            .expect("query")
            .len(),
        1
    );
}

#[test]
fn decided_leave_cannot_be_reopened() {
    let h = harness(&[("tech-a", "Ana")]);
    let roster = h.scheduler.roster();
    let leave = roster
        .request_leave(&TechnicianId::new("tech-a"), vacation(day(7, 1), day(7, 4)))
        .expect("leave filed");
    roster
        .decide_leave(&leave.id, LeaveStatus::Rejected)
        .expect("rejected");

    let reopened = roster.decide_leave(&leave.id, LeaveStatus::Approved);
    assert!(matches!(reopened, Err(SchedulingError::Invalid(_))));
}

#[test]
fn declared_absence_is_approved_unplanned_leave() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo")]);
    let absence = h
        .scheduler
        .roster()
        .declare_absence(
            &TechnicianId::new("tech-a"),
            visit_date(),
            visit_date(),
            "sick child".to_string(),
        )
        .expect("absence recorded");
    assert_eq!(absence.status, LeaveStatus::Approved);
    assert_eq!(absence.leave_type, LeaveType::Unplanned);

    let free = h
        .scheduler
        .availability()
        .find_available(visit_date(), slot(9), None)
        .expect("query");
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].id, TechnicianId::new("tech-b"));
}

#[test]
fn leave_must_end_after_it_starts_and_belong_to_a_known_technician() {
    let h = harness(&[("tech-a", "Ana")]);
    let roster = h.scheduler.roster();

    let backwards = roster.request_leave(&TechnicianId::new("tech-a"), vacation(day(7, 4), day(7, 1)));
    assert!(matches!(backwards, Err(SchedulingError::Invalid(_))));

    let stranger = roster.request_leave(&TechnicianId::new("tech-x"), vacation(day(7, 1), day(7, 4)));
    assert!(matches!(stranger, Err(SchedulingError::NotFound { .. })));
}

#[test]
fn vacation_balance_counts_approved_vacation_days_in_year() {
    let h = harness(&[("tech-a", "Ana")]);
    let roster = h.scheduler.roster();
    let tech = TechnicianId::new("tech-a");

    let summer = roster
        .request_leave(&tech, vacation(day(8, 4), day(8, 15)))
        .expect("filed");
    roster
        .decide_leave(&summer.id, LeaveStatus::Approved)
        .expect("approved");
    let winter = roster
        .request_leave(
            &tech,
            vacation(day(12, 29), NaiveDate::from_ymd_opt(2026, 1, 2).expect("valid date")),
        )
        .expect("filed");
    roster
        .decide_leave(&winter.id, LeaveStatus::Approved)
        .expect("approved");
    roster
        .request_leave(&tech, vacation(day(10, 6), day(10, 7)))
        .expect("pending request ignored");
    roster
        .declare_absence(&tech, day(3, 3), day(3, 3), "flu".to_string())
        .expect("absence ignored");

    let balance = roster.vacation_balance(&tech, 2025).expect("balance");
    assert_eq!(balance.used_days, 12 + 3);
    assert_eq!(balance.quota_days, 25);
    assert_eq!(balance.remaining_days, 10);
}

#[test]
fn deactivated_technicians_leave_availability() {
    let h = harness(&[("tech-a", "Ana")]);
    let tech = TechnicianId::new("tech-a");
    let updated = h
        .scheduler
        .roster()
        .set_active(&tech, false)
        .expect("deactivated");
    assert!(!updated.active);
    assert!(h
        .scheduler
        .availability()
        .find_available(visit_date(), slot(9), None)
        .expect("query")
        .is_empty());

    let duplicate = h.scheduler.roster().register_technician(technician("tech-a", "Ana"));
    assert!(matches!(duplicate, Err(SchedulingError::Conflict(_))));
}
