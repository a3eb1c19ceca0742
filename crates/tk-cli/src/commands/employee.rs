//! Employee commands.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};

use tk_core::{EmployeeId, EmployeePartial, EmployeeSearch, Engine, Filter};

use super::{Deleted, write_json};

#[derive(Debug, Subcommand)]
pub enum EmployeeAction {
    /// Register an employee. The email address must be unique.
    Create(CreateArgs),
    /// Show an employee.
    Read { id: EmployeeId },
    /// Change an employee's name or email address.
    Update(UpdateArgs),
    /// Delete an employee who owns no timers.
    Delete { id: EmployeeId },
    /// List employees.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: EmployeeId,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}

pub fn run<W: Write>(writer: &mut W, engine: &Engine, action: &EmployeeAction) -> Result<()> {
    match action {
        EmployeeAction::Create(args) => {
            let employee = engine.employee_create(EmployeePartial {
                first_name: args.first_name.clone(),
                last_name: args.last_name.clone(),
                email_address: Some(args.email.clone()),
                updated_by: None,
            })?;
            write_json(writer, &employee)
        }
        EmployeeAction::Read { id } => write_json(writer, &engine.employee_read(id)?),
        EmployeeAction::Update(args) => {
            let employee = engine.employee_update(
                &args.id,
                EmployeePartial {
                    first_name: args.first_name.clone(),
                    last_name: args.last_name.clone(),
                    email_address: args.email.clone(),
                    updated_by: None,
                },
            )?;
            write_json(writer, &employee)
        }
        EmployeeAction::Delete { id } => {
            engine.employee_delete(id)?;
            write_json(writer, &Deleted { deleted: id.as_str() })
        }
        EmployeeAction::List(args) => {
            let employees = engine.employee_search(&EmployeeSearch {
                email_address: args.email.clone().map_or(Filter::Any, Filter::Is),
                last_name: args.last_name.clone().map_or(Filter::Any, Filter::Is),
                ..EmployeeSearch::default()
            })?;
            write_json(writer, &employees)
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::commands::test_support::{engine, json};

    fn create_args(email: &str) -> EmployeeAction {
        EmployeeAction::Create(CreateArgs {
            email: email.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
        })
    }

    #[test]
    fn create_then_list_by_email() {
        let engine = engine();
        let mut output = Vec::new();
        run(&mut output, &engine, &create_args("ada@example.com")).unwrap();
        let created = json(output);
        assert_eq!(created["email_address"], "ada@example.com");
        assert_eq!(created["audit"]["version"], 1);

        run(&mut Vec::new(), &engine, &create_args("other@example.com")).unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &engine,
            &EmployeeAction::List(ListArgs {
                email: Some("ada@example.com".to_string()),
                last_name: None,
            }),
        )
        .unwrap();
        let listed = json(output);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], created["id"]);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let engine = engine();
        run(&mut Vec::new(), &engine, &create_args("ada@example.com")).unwrap();

        let err = run(&mut Vec::new(), &engine, &create_args("ada@example.com")).unwrap_err();
        assert_snapshot!(
            err.to_string(),
            @"employee_create: email address already in use: ada@example.com"
        );
    }

    #[test]
    fn update_changes_only_given_fields() {
        let engine = engine();
        let mut output = Vec::new();
        run(&mut output, &engine, &create_args("ada@example.com")).unwrap();
        let id: EmployeeId = json(output)["id"].as_str().unwrap().parse().unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &engine,
            &EmployeeAction::Update(UpdateArgs {
                id,
                email: None,
                first_name: Some("Augusta".to_string()),
                last_name: None,
            }),
        )
        .unwrap();

        let updated = json(output);
        assert_eq!(updated["first_name"], "Augusta");
        assert_eq!(updated["last_name"], "Lovelace");
        assert_eq!(updated["audit"]["version"], 2);
    }
}
