//! Identifier newtypes, validation errors and search filters.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for entity fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A field required on create was not provided.
    #[error("{field} is required")]
    Missing { field: &'static str },

    /// The field cannot change after create.
    #[error("{field} cannot be changed")]
    Immutable { field: &'static str },

    /// A slice would finish before it started.
    #[error("finish time is earlier than start time")]
    FinishBeforeStart,

    /// Another employee already uses this email address.
    #[error("email address already in use: {email}")]
    DuplicateEmail { email: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates an ID from an existing value after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Generates a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifies a timer. Immutable once assigned.
    TimerId, "timer ID"
);

define_string_id!(
    /// Identifies a single start/pause cycle of a timer.
    TimeSliceId, "time slice ID"
);

define_string_id!(
    /// Identifies an employee who may own timers.
    EmployeeId, "employee ID"
);

/// The entity types managed by the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Timer,
    TimeSlice,
    Employee,
}

impl Entity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::TimeSlice => "time slice",
            Self::Employee => "employee",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A search constraint on a single field.
///
/// A field is either unconstrained, matched against one value, or matched
/// against any value of a list. Criteria on different fields combine by AND.
/// An empty `AnyOf` list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter<T> {
    #[default]
    Any,
    Is(T),
    AnyOf(Vec<T>),
}

impl<T: PartialEq> Filter<T> {
    /// Returns true if `value` satisfies this filter.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Is(expected) => expected == value,
            Self::AnyOf(values) => values.contains(value),
        }
    }

    /// Like [`Filter::matches`] for optional fields; `None` only matches `Any`.
    pub fn matches_option(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (_, None) => false,
            (_, Some(value)) => self.matches(value),
        }
    }

    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}
