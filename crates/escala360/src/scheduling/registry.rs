use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, info};

use super::assignments::{load_professional, load_shift};
use super::audit;
use super::calendar::DateRange;
use super::domain::{
    AuditAction, EntityKind, NewProfessional, NewShift, Professional, ProfessionalId,
    ProfessionalPatch, Shift, ShiftId, ShiftPatch,
};
use super::error::SchedulingError;
use super::policy::{Clock, SchedulingPolicy};
use super::rules;
use super::store::{ScheduleStore, StoreTx};

/// Maintains the professional and shift registers.
pub struct RegistryService<S> {
    store: Arc<S>,
    policy: SchedulingPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: ScheduleStore> RegistryService<S> {
    pub fn new(store: Arc<S>, policy: SchedulingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn register_professional(
        &self,
        new: NewProfessional,
        actor: &str,
    ) -> Result<Professional, SchedulingError> {
        let new = normalize_professional(new)?;
        let now = self.clock.now();
        let professional = self.store.write(|tx| {
            let professional = tx.insert_professional(&new)?;
            audit::record(
                tx,
                EntityKind::Professional,
                professional.id.0,
                AuditAction::Created,
                actor,
                now,
            )?;
            Ok::<_, SchedulingError>(professional)
        })?;
        info!(professional_id = professional.id.0, actor, "professional registered");
        Ok(professional)
    }

    pub fn update_professional(
        &self,
        id: ProfessionalId,
        patch: ProfessionalPatch,
        actor: &str,
    ) -> Result<Professional, SchedulingError> {
        if patch.is_empty() {
            return Err(SchedulingError::Validation("nothing to update".to_string()));
        }

        let now = self.clock.now();
        self.store.write(|tx| {
            let current = load_professional(tx, id)?;
            let candidate = NewProfessional {
                name: patch.name.clone().unwrap_or(current.name),
                role: patch.role.clone().unwrap_or(current.role),
                email: patch.email.clone().unwrap_or(current.email),
                phone: patch.phone.clone().or(current.phone),
                active: patch.active.unwrap_or(current.active),
            };
            let candidate = normalize_professional(candidate)?;
            let updated = Professional {
                id,
                name: candidate.name,
                role: candidate.role,
                email: candidate.email,
                phone: candidate.phone,
                active: candidate.active,
            };

            tx.update_professional(&updated)?;
            audit::record(
                tx,
                EntityKind::Professional,
                id.0,
                AuditAction::Updated,
                actor,
                now,
            )?;
            Ok(updated)
        })
    }

    /// Marks the professional inactive; history and assignments are kept.
    pub fn deactivate_professional(
        &self,
        id: ProfessionalId,
        actor: &str,
    ) -> Result<Professional, SchedulingError> {
        let now = self.clock.now();
        self.store.write(|tx| {
            let mut professional = load_professional(tx, id)?;
            if !professional.active {
                return Err(SchedulingError::InvalidState(format!(
                    "professional {id} is already inactive"
                )));
            }
            professional.active = false;
            tx.update_professional(&professional)?;
            audit::record(
                tx,
                EntityKind::Professional,
                id.0,
                AuditAction::Deactivated,
                actor,
                now,
            )?;
            info!(professional_id = id.0, actor, "professional deactivated");
            Ok(professional)
        })
    }

    pub fn get_professional(&self, id: ProfessionalId) -> Result<Professional, SchedulingError> {
        self.store.read(|tx| load_professional(tx, id))
    }

    pub fn list_professionals(
        &self,
        active_only: bool,
    ) -> Result<Vec<Professional>, SchedulingError> {
        self.store
            .read(|tx| tx.professionals(active_only).map_err(SchedulingError::from))
    }

    pub fn create_shift(&self, new: NewShift, actor: &str) -> Result<Shift, SchedulingError> {
        validate_shift(&new)?;
        let now = self.clock.now();
        let shift = self.store.write(|tx| {
            let shift = tx.insert_shift(&new)?;
            audit::record(
                tx,
                EntityKind::Shift,
                shift.id.0,
                AuditAction::Created,
                actor,
                now,
            )?;
            Ok::<_, SchedulingError>(shift)
        })?;
        info!(shift_id = shift.id.0, date = %shift.date, actor, "shift created");
        Ok(shift)
    }

    /// Edits a shift; if it is staffed, the holder's weekly cap is checked
    /// against the new times.
    pub fn update_shift(
        &self,
        id: ShiftId,
        patch: ShiftPatch,
        actor: &str,
    ) -> Result<Shift, SchedulingError> {
        if patch.is_empty() {
            return Err(SchedulingError::Validation("nothing to update".to_string()));
        }

        let now = self.clock.now();
        self.store.write(|tx| {
            let mut shift = load_shift(tx, id)?;
            patch.apply(&mut shift);
            validate_shift(&NewShift {
                date: shift.date,
                start: shift.start,
                end: shift.end,
                function_id: shift.function_id,
                location_id: shift.location_id,
            })?;

            if let Some(holder) = tx.active_assignment_for_shift(id)? {
                rules::ensure_within_cap(
                    tx,
                    &self.policy,
                    holder.professional_id,
                    &shift,
                    Some(holder.id),
                )?;
            }

            tx.update_shift(&shift)?;
            audit::record(
                tx,
                EntityKind::Shift,
                id.0,
                AuditAction::Updated,
                actor,
                now,
            )?;
            Ok(shift)
        })
    }

    pub fn get_shift(&self, id: ShiftId) -> Result<Shift, SchedulingError> {
        self.store.read(|tx| load_shift(tx, id))
    }

    pub fn list_shifts(&self, range: &DateRange) -> Result<Vec<Shift>, SchedulingError> {
        if range.is_inverted() {
            return Err(SchedulingError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }
        self.store
            .read(|tx| tx.shifts(range).map_err(SchedulingError::from))
    }

    /// Registers `new` unless its email is already known; `None` means the
    /// row was skipped.
    pub fn import_professional(
        &self,
        new: NewProfessional,
        actor: &str,
    ) -> Result<Option<Professional>, SchedulingError> {
        let new = normalize_professional(new)?;
        let now = self.clock.now();
        self.store.write(|tx| {
            if tx.professional_by_email(&new.email)?.is_some() {
                debug!(email = %new.email, "professional already registered, skipping");
                return Ok(None);
            }
            let professional = tx.insert_professional(&new)?;
            record_created(tx, EntityKind::Professional, professional.id.0, actor, now)?;
            Ok(Some(professional))
        })
    }

    /// Creates `new` unless an identical shift exists; `None` means skipped.
    pub fn import_shift(
        &self,
        new: NewShift,
        actor: &str,
    ) -> Result<Option<Shift>, SchedulingError> {
        validate_shift(&new)?;
        let now = self.clock.now();
        self.store.write(|tx| {
            if tx.matching_shift(&new)?.is_some() {
                debug!(date = %new.date, "shift already exists, skipping");
                return Ok(None);
            }
            let shift = tx.insert_shift(&new)?;
            record_created(tx, EntityKind::Shift, shift.id.0, actor, now)?;
            Ok(Some(shift))
        })
    }
}

fn record_created(
    tx: &mut dyn StoreTx,
    entity: EntityKind,
    id: i64,
    actor: &str,
    at: NaiveDateTime,
) -> Result<(), SchedulingError> {
    audit::record(tx, entity, id, AuditAction::Created, actor, at).map(|_| ())
}

fn normalize_professional(new: NewProfessional) -> Result<NewProfessional, SchedulingError> {
    let name = required("name", &new.name)?;
    let role = required("role", &new.role)?;
    let email = required("email", &new.email)?.to_lowercase();
    if !looks_like_email(&email) {
        return Err(SchedulingError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    let phone = new
        .phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());

    Ok(NewProfessional {
        name,
        role,
        email,
        phone,
        active: new.active,
    })
}

fn required(field: &str, value: &str) -> Result<String, SchedulingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SchedulingError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Calendar years a shift may fall in.
const SHIFT_YEARS: RangeInclusive<i32> = 1900..=9999;

fn validate_shift(new: &NewShift) -> Result<(), SchedulingError> {
    if !SHIFT_YEARS.contains(&new.date.year()) {
        return Err(SchedulingError::Validation(format!(
            "shift date {} is outside years {}-{}",
            new.date,
            SHIFT_YEARS.start(),
            SHIFT_YEARS.end()
        )));
    }
    if new.start == new.end {
        return Err(SchedulingError::Validation(
            "shift start and end must differ".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn professional(name: &str, email: &str) -> NewProfessional {
        NewProfessional {
            name: name.to_string(),
            role: "Enfermeira".to_string(),
            email: email.to_string(),
            phone: Some("  ".to_string()),
            active: true,
        }
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        let normalized =
            normalize_professional(professional("  Ana  ", " Ana@Example.COM ")).expect("valid");
        assert_eq!(normalized.name, "Ana");
        assert_eq!(normalized.email, "ana@example.com");
        assert_eq!(normalized.phone, None);
    }

    #[test]
    fn blank_fields_and_bad_emails_are_rejected() {
        assert!(matches!(
            normalize_professional(professional(" ", "a@b.com")),
            Err(SchedulingError::Validation(_))
        ));
        for email in ["ana", "ana@", "@example.com", "ana@example", "ana@.com", "a b@x.com"] {
            assert!(
                normalize_professional(professional("Ana", email)).is_err(),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn shift_dates_must_fall_in_supported_years() {
        let shift = |year: i32| NewShift {
            date: chrono::NaiveDate::from_ymd_opt(year, 12, 31).expect("valid date"),
            start: chrono::NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
            end: chrono::NaiveTime::from_hms_opt(14, 0, 0).expect("valid time"),
            function_id: 1,
            location_id: 1,
        };
        assert!(validate_shift(&shift(2025)).is_ok());
        assert!(validate_shift(&shift(9999)).is_ok());
        assert!(matches!(
            validate_shift(&shift(10_000)),
            Err(SchedulingError::Validation(_))
        ));
        assert!(matches!(
            validate_shift(&shift(1899)),
            Err(SchedulingError::Validation(_))
        ));
    }
}
