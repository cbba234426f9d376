use std::sync::Arc;

use super::availability::{AvailabilityResolver, SlotCatalog};
use super::booking::BookingService;
use super::clock::{Clock, SystemClock};
use super::lifecycle::AppointmentLifecycle;
use super::reassignment::ReassignmentOrchestrator;
use super::repository::{Mailer, Notifier, SchedulingStore};
use super::reschedule::{RescheduleService, RescheduleSettings};
use super::roster::RosterService;

/// Settings shared by the scheduling components.
#[derive(Debug, Clone, Default)]
pub struct SchedulerSettings {
    pub catalog: SlotCatalog,
    pub reschedule: RescheduleSettings,
}

/// Facade wiring every scheduling component over one store, as used by the router and CLI.
pub struct Scheduler<S, N, M> {
    availability: Arc<AvailabilityResolver<S>>,
    booking: BookingService<S>,
    lifecycle: AppointmentLifecycle<S>,
    incidents: ReassignmentOrchestrator<S, N>,
    reschedule: RescheduleService<S, M>,
    roster: RosterService<S>,
}

impl<S, N, M> Scheduler<S, N, M>
where
    S: SchedulingStore + 'static,
    N: Notifier + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, mailer: Arc<M>, settings: SchedulerSettings) -> Self {
        Self::with_clock(store, notifier, mailer, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        notifier: Arc<N>,
        mailer: Arc<M>,
        settings: SchedulerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let SchedulerSettings {
            catalog,
            reschedule,
        } = settings;

        let availability = Arc::new(AvailabilityResolver::new(store.clone(), catalog.clone()));
        let incidents = ReassignmentOrchestrator::new(
            store.clone(),
            availability.clone(),
            notifier,
            clock.clone(),
            reschedule.public_url.clone(),
        );

        Self {
            booking: BookingService::new(store.clone(), catalog.clone()),
            lifecycle: AppointmentLifecycle::new(store.clone(), clock.clone()),
            reschedule: RescheduleService::new(store.clone(), mailer, clock, catalog, reschedule),
            roster: RosterService::new(store),
            availability,
            incidents,
        }
    }

    pub fn availability(&self) -> &AvailabilityResolver<S> {
        &self.availability
    }

    pub fn booking(&self) -> &BookingService<S> {
        &self.booking
    }

    pub fn lifecycle(&self) -> &AppointmentLifecycle<S> {
        &self.lifecycle
    }

    pub fn incidents(&self) -> &ReassignmentOrchestrator<S, N> {
        &self.incidents
    }

    pub fn reschedule(&self) -> &RescheduleService<S, M> {
        &self.reschedule
    }

    pub fn roster(&self) -> &RosterService<S> {
        &self.roster
    }
}
