use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

pub trait PolicyValidator {
    fn validate(&self, field: Field, value: &str) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Field {
    Action,
    ResourceType,
    FieldName,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Action => f.write_str("action"),
            Field::ResourceType => f.write_str("resource type"),
            Field::FieldName => f.write_str("field name"),
        }
    }
}

lazy_static! {
    // identifiers, optionally namespaced with `.` or `:` (e.g. `Blog.Post`, `posts:read`).
    static ref NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*([.:][A-Za-z_][A-Za-z0-9_]*)*$").expect("valid regex");
}

/// Accepts identifier-like names only.
#[derive(Debug)]
pub struct DefaultValidator;

impl PolicyValidator for DefaultValidator {
    fn validate(&self, field: Field, value: &str) -> Result<()> {
        if NAME.is_match(value) {
            Ok(())
        } else {
            Err(Error::Validation(format!("invalid {} `{}`", field, value)))
        }
    }
}
