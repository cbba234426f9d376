use crate::infra::{next_working_day, parse_date, Runtime};
use chrono::{Local, NaiveDate};
use clap::Args;
use fieldops::config::AppConfig;
use fieldops::error::AppError;
use fieldops::scheduling::{
    Appointment, BookingRequest, ClientInfo, IncidentOutcome, IncidentReport, ProjectId,
    RescheduleChoice, TechnicianId, TimeSlot, UserId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Visit date (YYYY-MM-DD). Defaults to the next working day.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct SlotsArgs {
    /// Date to inspect (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: NaiveDate,
}

pub(crate) fn run_slot_overview(args: SlotsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let runtime = Runtime::new(config.scheduling.scheduler_settings());
    let crew = runtime.seed_roster()?;

    println!("Slot overview for {} ({} technicians)", args.date, crew.len());
    for entry in runtime.scheduler.availability().slot_overview(args.date)? {
        println!(
            "  {}  capacity {}  demand {}  {}",
            entry.slot,
            entry.capacity,
            entry.demand,
            if entry.open { "open" } else { "full" }
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let runtime = Runtime::new(config.scheduling.scheduler_settings());
    let crew = runtime.seed_roster()?;
    let scheduler = &runtime.scheduler;

    let today = Local::now().date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    let date = next_working_day(args.date.unwrap_or(tomorrow));
    let slots = scheduler.availability().catalog().slots().to_vec();
    let (Some(&morning), Some(lead)) = (slots.first(), crew.first()) else {
        println!("No bookable slots or technicians; nothing to demonstrate");
        return Ok(());
    };

    println!("Technician scheduling demo for {date}");
    println!("- Roster: {}", join_ids(&crew));

    let visit = scheduler.booking().book(demo_booking(
        "proj-roof-01",
        lead,
        date,
        morning,
        "Marta Ruiz",
    ))?;
    print_appointment("Booked", &visit);

    let free = scheduler
        .availability()
        .find_available(date, morning, None)?;
    println!(
        "- Still free at {morning}: {}",
        join_ids(&free.into_iter().map(|technician| technician.id).collect::<Vec<_>>())
    );

    println!("\nIncident: {} reports a breakdown", visit.technician_id);
    let outcome = scheduler
        .incidents()
        .report_incident(&visit.id, breakdown(&visit.technician_id))?;
    print_outcome(&outcome);
    let visit = scheduler.lifecycle().get(&visit.id)?;
    print_appointment("Now", &visit);

    if let Some(&afternoon) = slots.last().filter(|slot| **slot != morning) {
        println!("\nIncident with the whole crew committed at {afternoon}");
        let mut last = None;
        for (n, technician_id) in crew.iter().enumerate() {
            let booked = scheduler.booking().book(demo_booking(
                &format!("proj-panel-{:02}", n + 1),
                technician_id,
                date,
                afternoon,
                "Jon Park",
            ))?;
            last = Some(booked);
        }
        if let Some(stranded) = last {
            let outcome = scheduler
                .incidents()
                .report_incident(&stranded.id, breakdown(&stranded.technician_id))?;
            print_outcome(&outcome);
            for request in scheduler.incidents().requests_for(&stranded.id)? {
                match serde_json::to_string_pretty(&request) {
                    Ok(json) => println!("  Admin request payload:\n{json}"),
                    Err(err) => println!("  Admin request payload unavailable: {err}"),
                }
            }
        }
    }

    println!("\nCustomer reschedule link");
    let token = scheduler
        .reschedule()
        .issue_token(&visit.id, &UserId::new("user-dispatch"))?;
    println!(
        "- Issued {} (expires {})",
        scheduler.reschedule().redemption_url(&token.token),
        token.expires_at.format("%Y-%m-%d %H:%M UTC")
    );

    let new_date = next_working_day(date.succ_opt().unwrap_or(date));
    let replacement = scheduler
        .availability()
        .find_available(new_date, morning, None)?
        .into_iter()
        .next();
    if let Some(technician) = replacement {
        let choice = RescheduleChoice {
            date: new_date,
            slot: morning,
            technician_id: technician.id,
        };
        let moved = scheduler.reschedule().redeem(&token.token, choice.clone())?;
        print_appointment("Rescheduled", &moved);

        match scheduler.reschedule().redeem(&token.token, choice) {
            Ok(_) => println!("- Second use unexpectedly accepted"),
            Err(err) => println!("- Second use refused: {} ({})", err, err.reason()),
        }
    } else {
        println!("- No technician free on {new_date}; link left unused");
    }

    println!(
        "\nOutbox: {} technician notices, {} customer e-mails",
        runtime.notifier.sent().len(),
        runtime.mailer.sent().len()
    );
    Ok(())
}

fn demo_booking(
    project: &str,
    technician_id: &TechnicianId,
    date: NaiveDate,
    slot: TimeSlot,
    customer: &str,
) -> BookingRequest {
    BookingRequest {
        project_id: ProjectId::new(project),
        technician_id: technician_id.clone(),
        date,
        slot,
        client: ClientInfo {
            name: customer.to_string(),
            address: "12 Harbour Road".to_string(),
            phone: None,
            email: Some(format!(
                "{}@customer.example",
                customer.to_ascii_lowercase().replace(' ', ".")
            )),
        },
        notes: "panel inspection".to_string(),
    }
}

fn breakdown(technician_id: &TechnicianId) -> IncidentReport {
    IncidentReport {
        reason: "vehicle breakdown".to_string(),
        comment: String::new(),
        reporter_id: UserId::new(format!("user-{technician_id}")),
    }
}

fn print_appointment(label: &str, appointment: &Appointment) {
    println!(
        "- {label} {}: {} with {} on {} at {} ({})",
        appointment.id,
        appointment.project_id,
        appointment.technician_id,
        appointment.date,
        appointment.slot,
        appointment.status.label()
    );
}

fn print_outcome(outcome: &IncidentOutcome) {
    match outcome {
        IncidentOutcome::Reassigned {
            new_technician_id,
            request_id,
        } => println!("- Reassigned to {new_technician_id} (audit {request_id})"),
        IncidentOutcome::RequestCreated { request_id } => {
            println!("- No replacement free; escalated as {request_id}")
        }
    }
}

fn join_ids(ids: &[TechnicianId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(TechnicianId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
