//! Field-level input checks. Every violation is collected before anything
//! reaches a store.

use std::str::FromStr;

use axum::extract::{FromRequest, FromRequestParts};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, FieldError};

/// `Json` that rejects with the uniform envelope instead of plain text.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` that rejects with the uniform envelope instead of plain text.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]{2,}$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_letters_and_spaces(name: &str) -> bool {
    lazy_static! {
        static ref NAME_RE: Regex = Regex::new(r"^[a-zA-Z\s]+$").expect("name regex compiles");
    }
    NAME_RE.is_match(name)
}

/// At least one lowercase letter, one uppercase letter and one digit.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn as_value(raw: Option<&str>) -> Value {
    raw.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null)
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: &str, value: Value) {
        self.errors.push(FieldError::new(field, message, value));
    }

    /// Trimmed text whose length (in characters) lies in `min..=max`.
    pub fn text(
        &mut self,
        field: &str,
        raw: Option<&str>,
        min: usize,
        max: usize,
        message: &str,
    ) -> Option<String> {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        let len = trimmed.chars().count();
        if raw.is_none() || len < min || len > max {
            self.push(field, message, as_value(raw));
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Like [`Validator::text`] but an absent field is not an error.
    pub fn optional_text(
        &mut self,
        field: &str,
        raw: Option<&str>,
        min: usize,
        max: usize,
        message: &str,
    ) -> Option<String> {
        raw?;
        self.text(field, raw, min, max, message)
    }

    pub fn one_of<T: FromStr>(&mut self, field: &str, raw: Option<&str>, message: &str) -> Option<T> {
        match raw.map(str::parse::<T>) {
            Some(Ok(v)) => Some(v),
            _ => {
                self.push(field, message, as_value(raw));
                None
            }
        }
    }

    pub fn optional_one_of<T: FromStr>(
        &mut self,
        field: &str,
        raw: Option<&str>,
        message: &str,
    ) -> Option<T> {
        raw?;
        self.one_of(field, raw, message)
    }

    pub fn name(&mut self, raw: Option<&str>) -> Option<String> {
        let name = self.text("name", raw, 1, 50, "Name must be between 1 and 50 characters")?;
        if !is_letters_and_spaces(&name) {
            self.push("name", "Name can only contain letters and spaces", as_value(raw));
            return None;
        }
        Some(name)
    }

    pub fn email(&mut self, raw: Option<&str>) -> Option<String> {
        let email = raw.map(normalize_email).unwrap_or_default();
        if !is_valid_email(&email) {
            self.push("email", "Please provide a valid email address", as_value(raw));
            return None;
        }
        Some(email)
    }

    /// A password chosen at signup: minimum length plus mixed character classes.
    pub fn new_password(&mut self, raw: Option<&str>) -> Option<String> {
        let password = raw.unwrap_or_default();
        if password.chars().count() < 6 {
            // the value of a password field is never echoed back
            self.push("password", "Password must be at least 6 characters long", Value::Null);
            return None;
        }
        if !is_strong_password(password) {
            self.push(
                "password",
                "Password must contain at least one lowercase letter, one uppercase letter, and one number",
                Value::Null,
            );
            return None;
        }
        Some(password.to_string())
    }

    pub fn required_password(&mut self, raw: Option<&str>) -> Option<String> {
        match raw {
            Some(p) if !p.is_empty() => Some(p.to_string()),
            _ => {
                self.push("password", "Password is required", Value::Null);
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }

    /// Finishes and unwraps the required values collected along the way.
    pub fn finish_with<T>(self, required: Option<T>) -> Result<T, AppError> {
        self.finish()?;
        required.ok_or_else(|| AppError::internal(anyhow::anyhow!("validated value missing")))
    }
}
