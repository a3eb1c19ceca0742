//! Employees - optional owners of timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{EmployeeId, Filter, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email_address: String,
    pub audit: Audit,
}

impl Employee {
    /// Builds a new employee. An email address is required.
    pub fn create(partial: EmployeePartial, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let email_address = partial
            .email_address
            .as_deref()
            .ok_or(ValidationError::Missing {
                field: "email address",
            })?
            .trim()
            .to_string();
        if email_address.is_empty() {
            return Err(ValidationError::Empty {
                field: "email address",
            });
        }
        Ok(Self {
            id: EmployeeId::generate(),
            first_name: partial.first_name.unwrap_or_default(),
            last_name: partial.last_name.unwrap_or_default(),
            email_address,
            audit: Audit::new(partial.updated_by, now),
        })
    }
}

/// Patch for a stored employee; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeePartial {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub updated_by: Option<String>,
}

impl EmployeePartial {
    /// Validates and applies the patch. On error the employee is untouched.
    pub fn apply(self, employee: &mut Employee, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let email_address = match self.email_address {
            Some(email) => {
                let email = email.trim().to_string();
                if email.is_empty() {
                    return Err(ValidationError::Empty {
                        field: "email address",
                    });
                }
                Some(email)
            }
            None => None,
        };
        if let Some(first_name) = self.first_name {
            employee.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            employee.last_name = last_name;
        }
        if let Some(email_address) = email_address {
            employee.email_address = email_address;
        }
        employee.audit.touch(self.updated_by.as_deref(), now);
        Ok(())
    }

    /// The trimmed email address this patch sets, if any.
    pub fn email(&self) -> Option<&str> {
        self.email_address.as_deref().map(str::trim)
    }
}

/// Search criteria for employees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeSearch {
    pub id: Filter<EmployeeId>,
    pub first_name: Filter<String>,
    pub last_name: Filter<String>,
    pub email_address: Filter<String>,
}

impl EmployeeSearch {
    pub fn matches(&self, employee: &Employee) -> bool {
        self.id.matches(&employee.id)
            && self.first_name.matches(&employee.first_name)
            && self.last_name.matches(&employee.last_name)
            && self.email_address.matches(&employee.email_address)
    }
}
