//! Input validation helpers used by the route handlers.

use validator::Validate;

use crate::error::BeaconError;

/// Validate a request body, collapsing any failure into a single
/// `invalid-request` error with the offending fields in the message.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), BeaconError> {
    body.validate()
        .map_err(|errors| BeaconError::InvalidRequest(format_validation_errors(errors)))
}

fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
