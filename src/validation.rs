use rocket::serde::json::Json;
use tracing::instrument;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, AppError> {
        let inner = self.into_inner();
        validate_input(&inner)?;
        Ok(inner)
    }
}

#[instrument(skip_all)]
pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::Validation(summarize(&errors)))
}

/// Flattens field errors into `field: message` pairs, ordered by field name.
fn summarize(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, field_errors)| {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();

    parts.sort();
    parts.join("; ")
}

/// Rejects blank strings, used for fields `length(min = 1)` would let through as whitespace.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Validate)]
    struct Sample {
        #[validate(custom(function = "not_blank"))]
        name: String,
        #[validate(range(min = 1.0, max = 5.0, message = "must be between 1 and 5"))]
        score: f64,
    }

    #[test]
    fn test_summary_names_every_failing_field() {
        let err = validate_input(&Sample {
            name: "  ".to_string(),
            score: 9.0,
        })
        .unwrap_err();

        match err {
            AppError::Validation(msg) => {
                assert_eq!(msg, "name: must not be blank; score: must be between 1 and 5");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_valid_input_passes() {
        let input = Sample {
            name: "Rust".to_string(),
            score: 4.0,
        };
        assert!(validate_input(&input).is_ok());
    }
}
