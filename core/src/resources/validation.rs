use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A rejected field in a resource document, rendered as
/// `{path}: {detail}` the way API validation errors read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    path: String,
    detail: String,
}

impl FieldError {
    pub fn required<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            detail: "Required value".to_string(),
        }
    }

    pub fn invalid<P: Into<String>, V: Display, M: Display>(path: P, value: V, message: M) -> Self {
        Self {
            path: path.into(),
            detail: format!("Invalid value: \"{value}\": {message}"),
        }
    }

    pub fn duplicate<P: Into<String>, V: Display>(path: P, value: V) -> Self {
        Self {
            path: path.into(),
            detail: format!("Duplicate value: \"{value}\""),
        }
    }

    pub fn not_found<P: Into<String>, V: Display>(path: P, value: V) -> Self {
        Self {
            path: path.into(),
            detail: format!("Not found: \"{value}\""),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)
    }
}

impl std::error::Error for FieldError {}

/// Joins field errors the way a rejected resource reports them.
pub fn join_field_errors(errors: &[FieldError]) -> String {
    match errors {
        [single] => single.to_string(),
        _ => format!("[{}]", errors.iter().join(", ")),
    }
}
