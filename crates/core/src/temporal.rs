//! Date arithmetic that decides whether a fact is recent enough to use and whether a periodic
//! screening is due.
//!
//! All checks measure against an explicit evaluation date rather than the system clock, so
//! a fixed `today` gives a fixed answer.

use crate::config::ConfigSource;
use crate::constants::COMPLICATED_EYE_EXAM_DAYS;
use crate::patient::{Medication, Patient};
use chrono::NaiveDate;

const DEFAULT_RECENCY_DAYS: i64 = 90;
const DEFAULT_SCREENING_DAYS: i64 = 365;

/// Recency and screening checks for one evaluation date.
#[derive(Clone, Copy)]
pub struct TemporalValidator<'a> {
    config: &'a dyn ConfigSource,
    today: NaiveDate,
}

impl<'a> TemporalValidator<'a> {
    pub fn new(config: &'a dyn ConfigSource, today: NaiveDate) -> Self {
        Self { config, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn config(&self) -> &'a dyn ConfigSource {
        self.config
    }

    fn days_since(&self, date: NaiveDate) -> i64 {
        (self.today - date).num_days()
    }

    /// Checks a dated fact against `thresholds.<kind>_recency_days`.
    ///
    /// # Errors
    ///
    /// The `Err` value is the human-readable reason the fact cannot be used:
    /// `"No <kind> result"` when absent, `"<n> days old (max <m>)"` when stale.
    pub fn is_current(&self, observed: Option<NaiveDate>, kind: &str) -> Result<(), String> {
        let Some(observed) = observed else {
            return Err(format!("No {kind} result"));
        };
        let age = self.days_since(observed);
        let max = self
            .config
            .get_i64(&format!("thresholds.{kind}_recency_days"), DEFAULT_RECENCY_DAYS);
        if age > max {
            return Err(format!("{age} days old (max {max})"));
        }
        Ok(())
    }

    /// Returns the reason a screening is due, or `None` if it is up to date.
    ///
    /// Patients with diabetes complications are recalled for eye exams every 180 days
    /// whatever the configured interval.
    pub fn needs_annual_screening(
        &self,
        last: Option<NaiveDate>,
        screening_type: &str,
        patient: &Patient,
    ) -> Option<String> {
        let Some(last) = last else {
            return Some("Never performed".into());
        };
        let days = self.days_since(last);
        let threshold = if screening_type == "eye_exam" && patient.has_diabetes_complications() {
            COMPLICATED_EYE_EXAM_DAYS
        } else {
            self.config.get_i64(
                &format!("thresholds.annual_{screening_type}_days"),
                DEFAULT_SCREENING_DAYS,
            )
        };
        (days > threshold).then(|| format!("Last performed {days} days ago"))
    }

    /// Days on a medication, up to its end date or the evaluation date if still active.
    pub fn medication_duration_days(&self, medication: &Medication) -> i64 {
        let end = medication.end_date.unwrap_or(self.today);
        (end - medication.start_date).num_days()
    }
}
