//! Request validation.
//!
//! JSON bodies go straight through `validator`. Query strings arrive as text,
//! so each query type first coerces its raw fields (numbers, booleans, ids,
//! enum choices) and only then runs its `Validate` bounds. Errors from both
//! phases end up in one [`FieldErrors`] map.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::utils::error::ApiError;

/// Field name -> every reason that field was rejected.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub fn push_error(errors: &mut FieldErrors, field: &str, reason: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(reason.into());
}

/// Copy `validator` failures, renaming struct fields to their JSON names.
pub fn collect_errors(errors: &mut FieldErrors, source: &ValidationErrors) {
    for (field, field_errors) in source.field_errors() {
        let name = camel_case(&field.to_string());
        for err in field_errors.iter() {
            let reason = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            push_error(errors, &name, reason);
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `validator` custom rule: length bounds count whitespace, this does not.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Run `Validate` and turn failures into an `ApiError::Validation`.
pub fn validate<T: Validate>(value: &T) -> Result<(), ApiError> {
    value.validate().map_err(|e| {
        let mut errors = FieldErrors::new();
        collect_errors(&mut errors, &e);
        ApiError::Validation(errors)
    })
}

/// Raw query parameters that coerce into a typed, validated value.
pub trait QueryParams: DeserializeOwned {
    type Output: Validate;

    /// Parse raw text fields, recording a reason for each failure.
    /// Returns `None` only when a required field could not be produced.
    fn coerce(self, errors: &mut FieldErrors) -> Option<Self::Output>;

    fn into_validated(self) -> Result<Self::Output, ApiError> {
        let mut errors = FieldErrors::new();
        let output = self.coerce(&mut errors);

        if let Some(value) = &output {
            if let Err(e) = value.validate() {
                collect_errors(&mut errors, &e);
            }
        }

        match output {
            Some(value) if errors.is_empty() => Ok(value),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// JSON body extractor that rejects with the uniform envelope.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let mut errors = FieldErrors::new();
            push_error(&mut errors, "body", rejection.body_text());
            ApiError::Validation(errors)
        })?;

        validate(&value)?;
        Ok(ValidatedJson(value))
    }
}

/// Query extractor for routes whose identifiers live in the query itself.
pub struct ValidatedQuery<T: QueryParams>(pub T::Output);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: QueryParams,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                let mut errors = FieldErrors::new();
                push_error(&mut errors, "query", rejection.body_text());
                ApiError::Validation(errors)
            })?;

        Ok(ValidatedQuery(raw.into_validated()?))
    }
}

/// Text-to-value coercions used by [`QueryParams`] implementations.
pub mod coerce {
    use super::*;

    pub fn number<N: FromStr>(
        errors: &mut FieldErrors,
        field: &str,
        raw: Option<&str>,
        default: N,
    ) -> N {
        match raw.map(str::trim) {
            None => default,
            Some(text) => text.parse().unwrap_or_else(|_| {
                push_error(errors, field, "must be a non-negative integer");
                default
            }),
        }
    }

    pub fn boolean(errors: &mut FieldErrors, field: &str, raw: Option<&str>, default: bool) -> bool {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None => default,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(_) => {
                push_error(errors, field, "must be true or false");
                default
            }
        }
    }

    /// Parse an enumerated value; unknown values fail instead of defaulting.
    pub fn choice<E: FromStr>(
        errors: &mut FieldErrors,
        field: &str,
        raw: Option<&str>,
        default: E,
        allowed: &[&str],
    ) -> E {
        match raw.map(str::trim) {
            None => default,
            Some(text) => text.parse().unwrap_or_else(|_| {
                push_error(errors, field, format!("must be one of: {}", allowed.join(", ")));
                default
            }),
        }
    }

    pub fn required_uuid(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<Uuid> {
        match raw.map(str::trim) {
            None | Some("") => {
                push_error(errors, field, "is required");
                None
            }
            Some(text) => match Uuid::parse_str(text) {
                Ok(id) => Some(id),
                Err(_) => {
                    push_error(errors, field, "must be a valid id");
                    None
                }
            },
        }
    }
}
