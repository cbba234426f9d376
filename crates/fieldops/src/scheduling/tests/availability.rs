use std::collections::BTreeSet;

use super::common::*;
use crate::scheduling::domain::{
    ActiveProject, LeaveRequestId, LeaveStatus, LeaveType, ProjectId, TechnicianId,
};
use crate::scheduling::repository::{LeaveLedger, TechnicianDirectory};

fn ids(technicians: &[crate::scheduling::domain::Technician]) -> Vec<&str> {
    technicians.iter().map(|technician| technician.id.as_str()).collect()
}

#[test]
fn available_technicians_skip_busy_absent_inactive_and_excluded() {
    let h = harness(&[
        ("tech-d", "Dee"),
        ("tech-a", "Ana"),
        ("tech-c", "Cy"),
        ("tech-b", "Bo"),
        ("tech-e", "Eli"),
    ]);
    h.book("proj-1", "tech-a", slot(9));
    grant_leave(
        &h.store,
        approved_leave("leave-b", "tech-b", visit_date(), visit_date()),
    );
    let mut inactive = technician("tech-c", "Cy");
    inactive.active = false;
    h.store.update_technician(inactive).expect("updated");

    let resolver = h.scheduler.availability();
    let free = resolver
        .find_available(visit_date(), slot(9), None)
        .expect("query succeeds");
    assert_eq!(ids(&free), vec!["tech-d", "tech-e"]);

    let excluded = TechnicianId::new("tech-d");
    let free = resolver
        .find_available(visit_date(), slot(9), Some(&excluded))
        .expect("query succeeds");
    assert_eq!(ids(&free), vec!["tech-e"]);

    let other_slot = resolver
        .find_available(visit_date(), slot(10), None)
        .expect("query succeeds");
    assert_eq!(ids(&other_slot), vec!["tech-a", "tech-d", "tech-e"]);
}

#[test]
fn project_assignment_without_appointment_still_blocks() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo")]);
    h.store
        .upsert_project(ActiveProject {
            id: ProjectId::new("proj-legacy"),
            assigned_to: BTreeSet::from([TechnicianId::new("tech-b")]),
            date: Some(visit_date()),
            slot: Some(slot(11)),
        })
        .expect("project stored");

    let free = h
        .scheduler
        .availability()
        .find_available(visit_date(), slot(11), None)
        .expect("query succeeds");
    assert_eq!(ids(&free), vec!["tech-a"]);
}

#[test]
fn pending_leave_does_not_block() {
    let h = harness(&[("tech-a", "Ana")]);
    h.store
        .insert_leave(crate::scheduling::domain::LeaveRequest {
            id: LeaveRequestId::new("leave-pending"),
            technician_id: TechnicianId::new("tech-a"),
            start_date: visit_date(),
            end_date: visit_date(),
            status: LeaveStatus::Pending,
            leave_type: LeaveType::Vacation,
            reason: "family trip".to_string(),
        })
        .expect("leave stored");

    let free = h
        .scheduler
        .availability()
        .find_available(visit_date(), slot(9), None)
        .expect("query succeeds");
    assert_eq!(ids(&free), vec!["tech-a"]);
}

#[test]
fn overlapping_leave_counts_each_technician_once() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo"), ("tech-c", "Cy")]);
    let week_end = visit_date().succ_opt().and_then(|d| d.succ_opt()).expect("valid date");
    grant_leave(
        &h.store,
        approved_leave("leave-1", "tech-a", visit_date(), week_end),
    );
    grant_leave(
        &h.store,
        approved_leave("leave-2", "tech-a", visit_date(), visit_date()),
    );
    h.book("proj-1", "tech-b", slot(9));

    let overview = h
        .scheduler
        .availability()
        .slot_overview(visit_date())
        .expect("overview");
    assert_eq!(overview.len(), 8);
    for entry in &overview {
        assert_eq!(entry.capacity, 2, "slot {}", entry.slot);
    }

    let nine = overview
        .iter()
        .find(|entry| entry.slot == slot(9))
        .expect("09:00 listed");
    assert_eq!(nine.demand, 1);
    assert!(nine.open);
}

#[test]
fn slot_closes_once_demand_reaches_capacity() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo")]);
    h.book("proj-1", "tech-a", slot(13));
    h.book("proj-2", "tech-b", slot(13));

    let open = h
        .scheduler
        .availability()
        .list_open_slots(visit_date())
        .expect("open slots");
    assert!(!open.contains(&slot(13)));
    assert!(open.contains(&slot(8)));
    assert_eq!(open.len(), 7);
}

#[test]
fn no_open_slots_when_everyone_is_away() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo")]);
    grant_leave(
        &h.store,
        approved_leave("leave-a", "tech-a", visit_date(), visit_date()),
    );
    grant_leave(
        &h.store,
        approved_leave("leave-b", "tech-b", visit_date(), visit_date()),
    );

    let open = h
        .scheduler
        .availability()
        .list_open_slots(visit_date())
        .expect("open slots");
    assert!(open.is_empty());
}

#[test]
fn leave_of_inactive_technicians_does_not_reduce_capacity_twice() {
    let h = harness(&[("tech-a", "Ana"), ("tech-b", "Bo")]);
    let mut inactive = technician("tech-b", "Bo");
    inactive.active = false;
    h.store.update_technician(inactive).expect("updated");
    grant_leave(
        &h.store,
        approved_leave("leave-b", "tech-b", visit_date(), visit_date()),
    );

    let overview = h
        .scheduler
        .availability()
        .slot_overview(visit_date())
        .expect("overview");
    assert!(overview.iter().all(|entry| entry.capacity == 1 && entry.open));
}

#[test]
fn sole_technician_on_leave_leaves_nobody_available() {
    let h = harness(&[("tech-a", "Ana")]);
    let leave_day = chrono::NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date");
    grant_leave(&h.store, approved_leave("leave-a", "tech-a", leave_day, leave_day));

    let free = h
        .scheduler
        .availability()
        .find_available(leave_day, slot(9), None)
        .expect("query succeeds");
    assert!(free.is_empty());
}

#[test]
fn cancelled_visit_returns_its_technician_to_the_pool() {
    let h = harness(&[("tech-a", "Ana")]);
    let visit = h.book("proj-1", "tech-a", slot(9));
    let resolver = h.scheduler.availability();
    assert!(!resolver
        .list_open_slots(visit_date())
        .expect("open slots")
        .contains(&slot(9)));

    h.scheduler
        .lifecycle()
        .set_status(
            &visit.id,
            crate::scheduling::domain::AppointmentStatus::Cancelled,
        )
        .expect("cancelled");

    let free = resolver
        .find_available(visit_date(), slot(9), None)
        .expect("query succeeds");
    assert_eq!(ids(&free), vec!["tech-a"]);
    assert!(resolver
        .list_open_slots(visit_date())
        .expect("open slots")
        .contains(&slot(9)));
    let nine = resolver
        .slot_overview(visit_date())
        .expect("overview")
        .into_iter()
        .find(|entry| entry.slot == slot(9))
        .expect("nine o'clock listed");
    assert_eq!(nine.demand, 0);
}
