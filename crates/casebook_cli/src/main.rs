//! Command-line surface for the case record service.
//!
//! # Responsibility
//! - Accept case input as JSON and print serialized cases or the field-keyed
//!   validation error map.
//! - Seed directory/feature/correspondence rows owned by other services.
//!
//! # Invariants
//! - Validation failures, including wrongly typed or missing JSON fields and
//!   a blank tag filter, print the error map on stdout and exit with code 2.
//! - Every other failure exits with code 1.

use anyhow::{anyhow, bail, Context, Result};
use casebook_core::db::open_db;
use casebook_core::{
    default_log_level, init_logging, CaseInput, CaseService, CaseServiceError,
    CorrespondenceRepository, DirectoryRepository, FeatureId, FeatureRepository,
    SqliteCaseRepository, SqliteCorrespondenceRepository, SqliteDirectoryRepository,
    SqliteFeatureRepository, UserId,
};
use clap::{Parser, Subcommand};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

const EXIT_OK: u8 = 0;
const EXIT_VALIDATION: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "casebook", version, about = "Case record service")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "CASEBOOK_DB", default_value = "casebook.db", global = true)]
    db: PathBuf,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "CASEBOOK_LOG_DIR", global = true)]
    log_dir: Option<String>,
    /// trace|debug|info|warn|error. Defaults by build mode.
    #[arg(long, env = "CASEBOOK_LOG_LEVEL", global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate and save a new case from JSON (`-` reads stdin).
    CreateCase {
        #[arg(long)]
        actor: UserId,
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Replace an existing case from JSON (`-` reads stdin).
    UpdateCase {
        id: Uuid,
        #[arg(long)]
        actor: UserId,
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Print one case with note/letter counters.
    ShowCase { id: Uuid },
    /// List cases with counters.
    ListCases {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// List known tag names.
    Tags,
    AddUser { username: String },
    AddInstitution { name: String },
    AddFeature {
        name: String,
        #[arg(long)]
        max_options: u32,
    },
    AddOption {
        #[arg(long)]
        feature: FeatureId,
        name: String,
    },
    AddNote { case: Uuid, comment: String },
    AddLetter { case: Uuid, name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(|err| anyhow!(err))?;
    }

    let mut conn = open_db(&cli.db)
        .with_context(|| format!("failed to open case store `{}`", cli.db.display()))?;
    info!("event=cli_command module=cli status=start");

    match cli.command {
        Command::CreateCase { actor, input } => {
            let raw = read_input(&input)?;
            let mut service = case_service(&mut conn)?;
            finish(parse_input(&raw).and_then(|input| service.create_case(actor, &input)))
        }
        Command::UpdateCase { id, actor, input } => {
            let raw = read_input(&input)?;
            let mut service = case_service(&mut conn)?;
            finish(parse_input(&raw).and_then(|input| service.update_case(actor, id, &input)))
        }
        Command::ShowCase { id } => {
            let service = case_service(&mut conn)?;
            let counted = service
                .get_case_counted(id)?
                .ok_or_else(|| anyhow!("case not found: {id}"))?;
            print_json(&counted)
        }
        Command::ListCases { tag, limit, offset } => {
            let service = case_service(&mut conn)?;
            finish(service.list_cases(tag, limit, offset).map(|listed| listed.items))
        }
        Command::Tags => {
            let service = case_service(&mut conn)?;
            print_json(&service.list_tags()?)
        }
        Command::AddUser { username } => {
            let id = SqliteDirectoryRepository::try_new(&conn)?.create_user(&username)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::AddInstitution { name } => {
            let id = SqliteDirectoryRepository::try_new(&conn)?.create_institution(&name)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::AddFeature { name, max_options } => {
            let features = SqliteFeatureRepository::try_new(&conn)?;
            print_json(&features.create_feature(&name, max_options)?)
        }
        Command::AddOption { feature, name } => {
            let features = SqliteFeatureRepository::try_new(&conn)?;
            if features.get_feature(feature)?.is_none() {
                bail!("feature not found: {feature}");
            }
            print_json(&features.create_option(feature, &name)?)
        }
        Command::AddNote { case, comment } => {
            let id = SqliteCorrespondenceRepository::try_new(&conn)?.add_note(case, &comment)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::AddLetter { case, name } => {
            let id = SqliteCorrespondenceRepository::try_new(&conn)?.add_letter(case, &name)?;
            print_json(&serde_json::json!({ "id": id }))
        }
    }
}

fn case_service(conn: &mut Connection) -> Result<CaseService<SqliteCaseRepository<'_>>> {
    Ok(CaseService::new(SqliteCaseRepository::try_new(conn)?))
}

/// Prints a case service outcome and returns the process status.
fn finish<T: Serialize>(result: Result<T, CaseServiceError>) -> Result<u8> {
    let (rendered, code) = render(result)?;
    println!("{rendered}");
    Ok(code)
}

fn render<T: Serialize>(result: Result<T, CaseServiceError>) -> Result<(String, u8)> {
    match result {
        Ok(value) => Ok((serde_json::to_string_pretty(&value)?, EXIT_OK)),
        Err(CaseServiceError::Validation(errors)) => {
            Ok((serde_json::to_string_pretty(&errors)?, EXIT_VALIDATION))
        }
        Err(other) => Err(other.into()),
    }
}

fn read_input(source: &str) -> Result<Value> {
    let raw = if source == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read case input from stdin")?
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read case input `{source}`"))?
    };
    serde_json::from_str(&raw).context("case input is not valid JSON")
}

fn parse_input(raw: &Value) -> Result<CaseInput, CaseServiceError> {
    CaseInput::from_json(raw).map_err(CaseServiceError::Validation)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<u8> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::{parse_input, render, run, CaseInput, Cli, Command, EXIT_OK, EXIT_VALIDATION};
    use casebook_core::{CaseRecord, CaseServiceError, ValidationErrors};
    use clap::Parser;
    use serde_json::{json, Value};

    #[test]
    fn create_case_reads_stdin_by_default() {
        let cli = Cli::try_parse_from(["casebook", "create-case", "--actor", "3"]).unwrap();
        match cli.command {
            Command::CreateCase { actor, input } => {
                assert_eq!(actor, 3);
                assert_eq!(input, "-");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn show_case_rejects_malformed_uuid() {
        assert!(Cli::try_parse_from(["casebook", "show-case", "not-a-uuid"]).is_err());
    }

    #[test]
    fn global_db_flag_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["casebook", "tags", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.db.to_str(), Some("/tmp/x.db"));
    }

    #[test]
    fn validation_failure_renders_error_map_with_status_two() {
        let mut errors = ValidationErrors::new();
        errors.add("featureoptions", "feature \"kategoria\" allows at most 3 options, got 4");
        let (rendered, code) =
            render::<CaseRecord>(Err(CaseServiceError::Validation(errors))).unwrap();

        assert_eq!(code, EXIT_VALIDATION);
        let map: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            map,
            json!({ "featureoptions": ["feature \"kategoria\" allows at most 3 options, got 4"] })
        );
    }

    #[test]
    fn other_service_failures_are_not_status_two() {
        let result = render::<CaseRecord>(Err(CaseServiceError::UnknownActor(9)));
        assert!(result.is_err());
    }

    #[test]
    fn wrong_typed_json_renders_field_keyed_map() {
        let (rendered, code) =
            render::<CaseInput>(parse_input(&json!({ "featureoptions": ["a"] }))).unwrap();
        assert_eq!(code, EXIT_VALIDATION);
        let map: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(map["name"], json!(["this field is required"]));
        assert_eq!(
            map["featureoptions"],
            json!(["incorrect type, expected pk value but got string"])
        );
    }

    #[test]
    fn create_case_command_exits_two_on_invalid_input_and_zero_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("casebook.db");
        let db = db.to_str().unwrap();
        let input = dir.path().join("case.json");
        let input = input.to_str().unwrap();

        let add_user = Cli::try_parse_from(["casebook", "--db", db, "add-user", "alice"]).unwrap();
        assert_eq!(run(add_user).unwrap(), EXIT_OK);

        std::fs::write(input, r#"{"comment": "x", "responsible_user": null}"#).unwrap();
        let create = ["casebook", "--db", db, "create-case", "--actor", "1", "--input", input];
        assert_eq!(run(Cli::try_parse_from(create).unwrap()).unwrap(), EXIT_VALIDATION);

        std::fs::write(input, r#"{"name": "Rejestr umów", "tag": ["umowy"]}"#).unwrap();
        assert_eq!(run(Cli::try_parse_from(create).unwrap()).unwrap(), EXIT_OK);

        let blank_filter = ["casebook", "--db", db, "list-cases", "--tag", " "];
        assert_eq!(
            run(Cli::try_parse_from(blank_filter).unwrap()).unwrap(),
            EXIT_VALIDATION
        );
    }
}
