//! Validation helpers for DTOs.

use validator::ValidationError;

/// Ages outside this window are treated as input mistakes.
pub const MIN_AGE: u8 = 18;
/// Upper bound of the accepted age window.
pub const MAX_AGE: u8 = 120;

/// Validates that a disclosed or filtered age falls in the accepted window.
pub fn validate_age(age: u8) -> Result<(), ValidationError> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        let mut err = ValidationError::new("age_out_of_range");
        err.message = Some(format!("age must be between {MIN_AGE} and {MAX_AGE} (got {age})").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a latitude/longitude pair in degrees.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&latitude) {
        let mut err = ValidationError::new("latitude_out_of_range");
        err.message = Some(format!("latitude must be within [-90, 90] (got {latitude})").into());
        return Err(err);
    }

    if !(-180.0..=180.0).contains(&longitude) {
        let mut err = ValidationError::new("longitude_out_of_range");
        err.message = Some(format!("longitude must be within [-180, 180] (got {longitude})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_age() {
        assert!(validate_age(18).is_ok());
        assert!(validate_age(64).is_ok());
        assert!(validate_age(120).is_ok());
        assert!(validate_age(17).is_err());
        assert!(validate_age(121).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(48.85, 2.35).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
    }
}
