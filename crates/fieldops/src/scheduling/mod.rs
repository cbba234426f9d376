//! Technician scheduling: availability, booking, appointment lifecycle, incident
//! reassignment, customer reschedule links and the technician roster.

pub mod availability;
pub mod booking;
pub mod clock;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod reassignment;
pub mod repository;
pub mod reschedule;
pub mod roster;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use availability::{AvailabilityResolver, SlotAvailability, SlotCatalog};
pub use booking::{BookingRequest, BookingService};
pub use clock::{Clock, SystemClock};
pub use domain::{
    ActiveProject, AdminRequest, AdminRequestDetails, AdminRequestId, AdminRequestKind,
    AdminRequestStatus, Appointment, AppointmentId, AppointmentStatus, ClientInfo,
    ContactDetails, IncidentDetails, LeaveRequest, LeaveRequestId, LeaveStatus, LeaveType,
    ProjectId, RequestPriority, RescheduleRequestDetails, RescheduleToken, Technician,
    TechnicianId, TimeSlot, TokenRejection, UserId, WorkDay, WorkingHours,
};
pub use error::SchedulingError;
pub use lifecycle::AppointmentLifecycle;
pub use memory::InMemorySchedulingStore;
pub use reassignment::{
    IncidentOutcome, IncidentReport, ReassignmentOrchestrator, MANUAL_RESCHEDULE_ACTION,
};
pub use repository::{
    AdminRequestLog, AssignmentStore, DeliveryError, LeaveLedger, Mailer, Notifier,
    Reassignment, RedemptionError, RepositoryError, RescheduleEmail, SchedulingStore,
    TechnicianDirectory, TechnicianNotice, TokenRedemption, TokenStore,
};
pub use reschedule::{EmailPolicy, RescheduleChoice, RescheduleService, RescheduleSettings};
pub use roster::{LeaveSubmission, RosterService, VacationBalance};
pub use router::scheduling_router;
pub use service::{Scheduler, SchedulerSettings};
