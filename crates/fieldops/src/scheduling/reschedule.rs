use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::availability::SlotCatalog;
use super::clock::Clock;
use super::domain::{
    Appointment, AppointmentId, RescheduleToken, TechnicianId, TimeSlot, TokenRejection, UserId,
};
use super::error::SchedulingError;
use super::repository::{
    AssignmentStore, Mailer, RescheduleEmail, TokenRedemption, TokenStore,
};

/// Whether a failed reschedule e-mail fails the issuing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPolicy {
    Required,
    BestEffort,
}

impl FromStr for EmailPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown e-mail policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RescheduleSettings {
    pub token_ttl: Duration,
    pub public_url: String,
    pub email_policy: EmailPolicy,
}

impl Default for RescheduleSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(48),
            public_url: "http://localhost:3000".to_string(),
            email_policy: EmailPolicy::Required,
        }
    }
}

/// New visit details chosen by the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleChoice {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub technician_id: TechnicianId,
}

/// Issues, validates and redeems single-use reschedule links.
pub struct RescheduleService<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    clock: Arc<dyn Clock>,
    catalog: SlotCatalog,
    settings: RescheduleSettings,
}

impl<S, M> RescheduleService<S, M>
where
    S: AssignmentStore + TokenStore + 'static,
    M: Mailer + 'static,
{
    pub fn new(
        store: Arc<S>,
        mailer: Arc<M>,
        clock: Arc<dyn Clock>,
        catalog: SlotCatalog,
        settings: RescheduleSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            catalog,
            settings,
        }
    }

    pub fn redemption_url(&self, token: &str) -> String {
        format!(
            "{}/reschedule/{}",
            self.settings.public_url.trim_end_matches('/'),
            token
        )
    }

    /// Store a fresh token for the appointment and e-mail the link to the customer.
    pub fn issue_token(
        &self,
        appointment_id: &AppointmentId,
        issuer_id: &UserId,
    ) -> Result<RescheduleToken, SchedulingError> {
        let appointment = self
            .store
            .fetch_appointment(appointment_id)?
            .ok_or_else(|| SchedulingError::not_found("appointment", appointment_id))?;

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.settings.token_ttl).ok_or_else(|| {
            SchedulingError::Invalid("reschedule link lifetime is out of range".to_string())
        })?;
        let token = self.store.insert_token(RescheduleToken {
            token: Uuid::new_v4().simple().to_string(),
            appointment_id: appointment.id.clone(),
            issued_by: issuer_id.clone(),
            created_at: now,
            expires_at,
            used_at: None,
        })?;
        info!(
            appointment = %appointment.id,
            issuer = %issuer_id,
            expires_at = %token.expires_at,
            "reschedule link issued"
        );

        let email = RescheduleEmail {
            recipient: appointment.client.email.clone(),
            customer_name: appointment.client.name.clone(),
            url: self.redemption_url(&token.token),
            expires_at: token.expires_at,
        };
        if let Err(err) = self.mailer.send_reschedule_link(email) {
            match self.settings.email_policy {
                EmailPolicy::Required => return Err(err.into()),
                EmailPolicy::BestEffort => warn!(
                    appointment = %appointment.id,
                    error = %err,
                    "reschedule e-mail failed; link remains valid"
                ),
            }
        }

        Ok(token)
    }

    /// Read-only check returning the appointment the token grants access to.
    pub fn validate(&self, token: &str) -> Result<Appointment, SchedulingError> {
        let stored = self
            .store
            .fetch_token(token)?
            .ok_or(TokenRejection::Unknown)?;
        stored.check(self.clock.now())?;

        self.store
            .fetch_appointment(&stored.appointment_id)?
            .ok_or_else(|| SchedulingError::not_found("appointment", &stored.appointment_id))
    }

    /// Apply the customer's choice and burn the token; the loser of a concurrent redemption
    /// receives `AlreadyUsed`.
    pub fn redeem(
        &self,
        token: &str,
        choice: RescheduleChoice,
    ) -> Result<Appointment, SchedulingError> {
        self.validate(token)?;
        self.catalog.ensure_contains(choice.slot)?;

        let updated = self.store.redeem_token(TokenRedemption {
            token: token.to_string(),
            now: self.clock.now(),
            date: choice.date,
            slot: choice.slot,
            technician_id: choice.technician_id,
        })?;
        info!(
            appointment = %updated.id,
            date = %updated.date,
            slot = %updated.slot,
            technician = %updated.technician_id,
            "appointment rescheduled through link"
        );
        Ok(updated)
    }
}
