//! Validation Utilities

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::error::AppError;

/// Flatten validation errors into a single `field: message` line.
pub fn describe(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into())
}

/// Unwrap a JSON body and run its `validate()` contract.
///
/// Any failure becomes `InvalidData` carrying the handler's public message;
/// the underlying reason is only logged.
pub fn validated_body<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
    public_message: &str,
) -> Result<T, AppError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::error!("Error validating request: {}", rejection.body_text());
        AppError::InvalidData(public_message.to_string())
    })?;

    validate(body, public_message)
}

/// Like [`validated_body`] for endpoints where the body may be left out.
///
/// An empty body reads as the DTO's default.
pub fn validated_optional_body<T>(body: &Bytes, public_message: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Default + Validate,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return validate(T::default(), public_message);
    }
    let dto = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Error validating request: {}", e);
        AppError::InvalidData(public_message.to_string())
    })?;
    validate(dto, public_message)
}

/// Run the `validate()` contract on an already-built DTO.
pub fn validate<T: Validate>(dto: T, public_message: &str) -> Result<T, AppError> {
    dto.validate().map_err(|errors| {
        tracing::error!("Error validating request: {}", describe(&errors));
        AppError::InvalidData(public_message.to_string())
    })?;
    Ok(dto)
}

/// Parse a numeric path segment.
pub fn parse_id(raw: &str, public_message: &str) -> Result<i64, AppError> {
    raw.trim_end_matches('/').parse::<i64>().map_err(|_| {
        tracing::error!("Error validating request: invalid id {:?}", raw);
        AppError::InvalidData(public_message.to_string())
    })
}
