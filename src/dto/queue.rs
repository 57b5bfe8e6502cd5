use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{MAX_AGE, MIN_AGE, validate_age, validate_coordinates},
    state::queue::{AgeRange, GeoPoint, Preferences},
};

/// Matching preferences supplied when joining the queue.
///
/// All fields are optional: an entry without filters pairs with anyone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PreferencesInput {
    /// Disclosed age of the caller, required for counterparts filtering on age.
    #[serde(default)]
    pub age: Option<u8>,
    /// Lower bound of the acceptable counterpart age, inclusive.
    #[serde(default)]
    pub min_age: Option<u8>,
    /// Upper bound of the acceptable counterpart age, inclusive.
    #[serde(default)]
    pub max_age: Option<u8>,
    /// Disclosed latitude in degrees.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Disclosed longitude in degrees.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Maximum distance to the counterpart, in kilometres.
    #[serde(default)]
    pub max_distance_km: Option<u32>,
}

impl Validate for PreferencesInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, value) in [
            ("age", self.age),
            ("min_age", self.min_age),
            ("max_age", self.max_age),
        ] {
            if let Some(age) = value {
                if let Err(e) = validate_age(age) {
                    errors.add(field, e);
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                let mut err = ValidationError::new("age_range_inverted");
                err.message = Some(format!("min_age {min} exceeds max_age {max}").into());
                errors.add("min_age", err);
            }
        }

        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if let Err(e) = validate_coordinates(latitude, longitude) {
                    errors.add("latitude", e);
                }
            }
            (None, None) => {}
            _ => {
                let mut err = ValidationError::new("coordinates_incomplete");
                err.message =
                    Some("latitude and longitude must be provided together".into());
                errors.add("latitude", err);
            }
        }

        if self.max_distance_km == Some(0) {
            let mut err = ValidationError::new("distance_zero");
            err.message = Some("max_distance_km must be strictly positive".into());
            errors.add("max_distance_km", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<PreferencesInput> for Preferences {
    fn from(input: PreferencesInput) -> Self {
        let age_range = (input.min_age.is_some() || input.max_age.is_some()).then(|| AgeRange {
            min: input.min_age.unwrap_or(MIN_AGE),
            max: input.max_age.unwrap_or(MAX_AGE),
        });

        let location = match (input.latitude, input.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Self {
            age: input.age,
            age_range,
            location,
            max_distance_km: input.max_distance_km,
        }
    }
}

/// Payload used to join the matchmaking queue.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct EnqueueRequest {
    /// Optional matching preferences.
    #[serde(default)]
    #[validate(nested)]
    pub preferences: Option<PreferencesInput>,
}

/// Handle returned on enqueue, used to poll and cancel the wait.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueTicketResponse {
    /// The ticket identifying this queue entry.
    pub ticket: Uuid,
}

/// Where a polled ticket currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Still waiting in the pool.
    Queued,
    /// Paired; the session identifier is attached.
    Matched,
}

/// Status answer for `GET /queue/{ticket}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatusResponse {
    /// Current status of the ticket.
    pub status: QueueStatus,
    /// Session the ticket was paired into, when matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Seconds spent waiting so far, when still queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waited_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_preferences_validate_and_convert_to_no_filters() {
        let input = PreferencesInput::default();
        assert!(input.validate().is_ok());
        assert_eq!(Preferences::from(input), Preferences::default());
    }

    #[test]
    fn partial_age_bounds_are_widened_to_the_accepted_window() {
        let input = PreferencesInput {
            min_age: Some(30),
            ..PreferencesInput::default()
        };
        assert!(input.validate().is_ok());

        let preferences = Preferences::from(input);
        assert_eq!(
            preferences.age_range,
            Some(AgeRange {
                min: 30,
                max: MAX_AGE
            })
        );
    }

    #[test]
    fn inverted_age_range_is_rejected() {
        let input = PreferencesInput {
            min_age: Some(40),
            max_age: Some(30),
            ..PreferencesInput::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn lone_coordinate_is_rejected() {
        let input = PreferencesInput {
            latitude: Some(48.85),
            ..PreferencesInput::default()
        };
        assert!(input.validate().is_err());
    }
}
