use chrono::{Datelike, Duration, NaiveDate, Weekday};
use fieldops::scheduling::{
    ContactDetails, DeliveryError, InMemorySchedulingStore, Mailer, Notifier, RescheduleEmail,
    Scheduler, SchedulerSettings, SchedulingError, Technician, TechnicianId, TechnicianNotice,
    WorkingHours,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ServiceScheduler = Scheduler<InMemorySchedulingStore, OutboxNotifier, OutboxMailer>;

/// Technician notifier that logs each notice and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct OutboxNotifier {
    sent: Arc<Mutex<Vec<TechnicianNotice>>>,
}

impl Notifier for OutboxNotifier {
    fn notify(&self, notice: TechnicianNotice) -> Result<(), DeliveryError> {
        info!(technician = %notice.recipient, link = %notice.link, "technician notified");
        self.sent
            .lock()
            .map_err(|_| DeliveryError::Transport("notifier outbox poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

impl OutboxNotifier {
    pub(crate) fn sent(&self) -> Vec<TechnicianNotice> {
        self.sent.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

/// Customer mailer that logs each reschedule link and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct OutboxMailer {
    sent: Arc<Mutex<Vec<RescheduleEmail>>>,
}

impl Mailer for OutboxMailer {
    fn send_reschedule_link(&self, email: RescheduleEmail) -> Result<(), DeliveryError> {
        let Some(recipient) = email.recipient.as_deref() else {
            return Err(DeliveryError::MissingRecipient(email.customer_name.clone()));
        };
        info!(%recipient, url = %email.url, "reschedule link mailed");
        self.sent
            .lock()
            .map_err(|_| DeliveryError::Transport("mail outbox poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

impl OutboxMailer {
    pub(crate) fn sent(&self) -> Vec<RescheduleEmail> {
        self.sent.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

/// In-process wiring of the scheduler and its adapters.
pub(crate) struct Runtime {
    pub(crate) notifier: Arc<OutboxNotifier>,
    pub(crate) mailer: Arc<OutboxMailer>,
    pub(crate) scheduler: Arc<ServiceScheduler>,
}

impl Runtime {
    pub(crate) fn new(settings: SchedulerSettings) -> Self {
        let store = Arc::new(InMemorySchedulingStore::default());
        let notifier = Arc::new(OutboxNotifier::default());
        let mailer = Arc::new(OutboxMailer::default());
        let scheduler = Arc::new(Scheduler::new(
            store,
            notifier.clone(),
            mailer.clone(),
            settings,
        ));
        Self {
            notifier,
            mailer,
            scheduler,
        }
    }

    /// Register the sample crew used by the demo and the `slots` command.
    pub(crate) fn seed_roster(&self) -> Result<Vec<TechnicianId>, SchedulingError> {
        let crew = [
            ("tech-001", "Ana Lopez", &["solar", "roofing"][..]),
            ("tech-002", "Bo Chen", &["solar"][..]),
            ("tech-003", "Cy Okafor", &["electrical", "solar"][..]),
        ];

        let mut ids = Vec::with_capacity(crew.len());
        for (id, name, specialties) in crew {
            let technician = self.scheduler.roster().register_technician(Technician {
                id: TechnicianId::new(id),
                name: name.to_string(),
                contact: ContactDetails {
                    email: Some(format!("{id}@fieldops.example")),
                    phone: None,
                },
                specialties: specialties.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                active: true,
                working_hours: WorkingHours::default(),
                vacation_quota_days: 25,
            })?;
            ids.push(technician.id);
        }
        Ok(ids)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// First Monday-to-Friday date on or after `from`.
pub(crate) fn next_working_day(from: NaiveDate) -> NaiveDate {
    match from.weekday() {
        Weekday::Sat => from + Duration::days(2),
        Weekday::Sun => from + Duration::days(1),
        _ => from,
    }
}
