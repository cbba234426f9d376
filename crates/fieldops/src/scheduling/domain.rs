use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a field technician.
    TechnicianId
);
string_id!(
    /// Identifier of the project an appointment belongs to.
    ProjectId
);
string_id!(AppointmentId);
string_id!(LeaveRequestId);
string_id!(AdminRequestId);
string_id!(
    /// Back-office user (admin, reporter, issuer) performing an action.
    UserId
);

/// Atomic unit of booking: a fixed start time within a day, rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map(Self)
            .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Weekly template a technician normally works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub days: BTreeSet<WorkDay>,
    pub start: TimeSlot,
    pub end: TimeSlot,
}

impl WorkingHours {
    pub fn covers(&self, date: NaiveDate, slot: TimeSlot) -> bool {
        self.days.contains(&WorkDay::from(date.weekday())) && slot >= self.start && slot < self.end
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            days: [
                WorkDay::Mon,
                WorkDay::Tue,
                WorkDay::Wed,
                WorkDay::Thu,
                WorkDay::Fri,
            ]
            .into_iter()
            .collect(),
            start: TimeSlot(NaiveTime::MIN + chrono::Duration::hours(8)),
            end: TimeSlot(NaiveTime::MIN + chrono::Duration::hours(17)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkDay {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<Weekday> for WorkDay {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Directory entry for a field technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub name: String,
    #[serde(default)]
    pub contact: ContactDetails,
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    pub active: bool,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub vacation_quota_days: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Admin-controlled transitions. Approved leave may only be withdrawn.
    pub const fn can_become(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Cancelled)
                | (Self::Approved, Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Vacation,
    Sickness,
    Unplanned,
    Suspension,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub technician_id: TechnicianId,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    pub leave_type: LeaveType,
    #[serde(default)]
    pub reason: String,
}

impl LeaveRequest {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn blocks(&self, date: NaiveDate) -> bool {
        self.status == LeaveStatus::Approved && self.covers(date)
    }

    /// Number of days of this leave falling inside `year`.
    pub fn days_in_year(&self, year: i32) -> i64 {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return 0;
        };
        let start = self.start_date.max(first);
        let end = self.end_date.min(last);
        if end < start {
            0
        } else {
            (end - start).num_days() + 1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Client details copied onto the appointment for technician-facing views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub technician_id: TechnicianId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default)]
    pub photos: Vec<String>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Whether this appointment holds its technician's time at `date`/`slot`.
    pub fn occupies(&self, date: NaiveDate, slot: TimeSlot) -> bool {
        self.status != AppointmentStatus::Cancelled && self.date == date && self.slot == slot
    }

    /// Move to `status`, stamping check-in on `in_progress` and check-out on `completed`.
    /// Existing stamps are kept.
    pub fn enter(&mut self, status: AppointmentStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            AppointmentStatus::InProgress => {
                self.check_in_time.get_or_insert(now);
            }
            AppointmentStatus::Completed => {
                self.check_out_time.get_or_insert(now);
            }
            AppointmentStatus::Scheduled | AppointmentStatus::Cancelled => {}
        }
    }
}

/// Project record owned by the wider portal; only its assignment and schedule are touched here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveProject {
    pub id: ProjectId,
    #[serde(default)]
    pub assigned_to: BTreeSet<TechnicianId>,
    pub date: Option<NaiveDate>,
    pub slot: Option<TimeSlot>,
}

impl ActiveProject {
    pub fn unscheduled(id: ProjectId) -> Self {
        Self {
            id,
            assigned_to: BTreeSet::new(),
            date: None,
            slot: None,
        }
    }

    pub fn scheduled_at(&self, date: NaiveDate, slot: TimeSlot) -> bool {
        self.date == Some(date) && self.slot == Some(slot)
    }

    /// Swap one technician for another without disturbing co-assigned technicians.
    pub fn replace_technician(&mut self, previous: Option<&TechnicianId>, next: TechnicianId) {
        if let Some(previous) = previous {
            self.assigned_to.remove(previous);
        }
        self.assigned_to.insert(next);
    }
}

/// Single-use capability letting a customer move their appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleToken {
    pub token: String,
    pub appointment_id: AppointmentId,
    pub issued_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl RescheduleToken {
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), TokenRejection> {
        if self.used_at.is_some() {
            return Err(TokenRejection::AlreadyUsed);
        }
        if now >= self.expires_at {
            return Err(TokenRejection::Expired);
        }
        Ok(())
    }
}

/// Reason a reschedule link cannot be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum TokenRejection {
    #[error("reschedule link is not recognised")]
    Unknown,
    #[error("reschedule link has already been used")]
    AlreadyUsed,
    #[error("reschedule link has expired")]
    Expired,
}

impl TokenRejection {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::AlreadyUsed => "already_used",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRequestKind {
    IncidentReport,
    RescheduleRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRequestStatus {
    Pending,
    AutoResolved,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDetails {
    pub reason: String,
    pub comment: String,
    pub reported_at: DateTime<Utc>,
    pub original_technician_id: TechnicianId,
    pub new_technician_id: TechnicianId,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequestDetails {
    pub reason: String,
    pub comment: String,
    pub reported_at: DateTime<Utc>,
    pub technician_id: TechnicianId,
    pub suggested_action: String,
}

/// Structured payload of an admin request; the variant always matches the request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminRequestDetails {
    IncidentReport(IncidentDetails),
    RescheduleRequest(RescheduleRequestDetails),
}

impl AdminRequestDetails {
    pub const fn kind(&self) -> AdminRequestKind {
        match self {
            Self::IncidentReport(_) => AdminRequestKind::IncidentReport,
            Self::RescheduleRequest(_) => AdminRequestKind::RescheduleRequest,
        }
    }
}

/// Audit and escalation record written by the incident workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRequest {
    pub id: AdminRequestId,
    pub priority: RequestPriority,
    pub status: AdminRequestStatus,
    pub requester_id: UserId,
    pub appointment_id: AppointmentId,
    pub details: AdminRequestDetails,
    pub created_at: DateTime<Utc>,
}

impl AdminRequest {
    pub const fn kind(&self) -> AdminRequestKind {
        self.details.kind()
    }
}
