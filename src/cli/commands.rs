use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    app::{get_config_dir, init_config, load_config, load_config_from, Config},
    auth::{Capability, GuardOutcome, LogNavigator, RouteGuard, SessionManager, SessionState},
    gateway::ApiGateway,
    services::{
        AppointmentFilters, AppointmentService, AppointmentStatus, AuthService, ClinicService,
        DoctorService, MedicalRecordService, PatientService, SpecialtyService, UserService,
        format_scheduled_at,
    },
    storage::{FileStorage, Storage},
    utils::{ClinicError, Result as ClinicResult},
};

use super::{Cli, Commands, Resource};

/// Handle CLI subcommands
pub async fn handle_command(cli: &Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        println!("Initializing clinicdesk configuration...");
        let path = init_config(None)?;
        println!("Configuration ready at {}", path.display().to_string().green());
        return Ok(());
    }

    let config = resolve_config(cli)?;
    let watch = matches!(cli.command, Commands::Watch);
    let session = open_session(&config, watch)?;

    let outcome = run(cli, &config, &session).await;
    session.shutdown();
    outcome
}

async fn run(cli: &Cli, config: &Config, session: &SessionManager) -> Result<()> {
    match &cli.command {
        Commands::Init => Ok(()),
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password.clone(),
                None => prompt_password(io::stdin().lock())?,
            };
            let auth = AuthService::new(session.gateway().clone());
            let response = auth
                .sign_in(session, email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            println!(
                "{} logged in as {} (user {})",
                "[OK]".green(),
                response.role.to_lowercase().cyan(),
                response.id
            );
            Ok(())
        },
        Commands::Logout => {
            session.logout();
            println!("{} session cleared", "[OK]".green());
            Ok(())
        },
        Commands::Status => {
            show_status(cli, config, session);
            Ok(())
        },
        Commands::Watch => watch_session(session).await,
        Commands::List { resource } => {
            require(session, resource.read_capability())?;
            let data = list(*resource, session.gateway())
                .await
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            print_value(&data, cli.json);
            Ok(())
        },
        Commands::Show { resource, id } => {
            require(session, resource.read_capability())?;
            let data = show(*resource, session.gateway(), id)
                .await
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            print_value(&data, cli.json);
            Ok(())
        },
        Commands::Delete { resource, id } => {
            require(session, resource.write_capability())?;
            delete(*resource, session.gateway(), id)
                .await
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            println!("{} deleted {:?} {}", "[OK]".green(), resource, id);
            Ok(())
        },
    }
}

/// Read the password as one line so it never appears in argv or shell history
fn prompt_password(mut input: impl BufRead) -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("No password given. Pass --password, set CLINICDESK_PASSWORD or type it at the prompt.");
    }
    Ok(password.to_string())
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            load_config_from(&[path.clone()])?
        },
        None => load_config()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    Ok(config)
}

fn storage_path(config: &Config) -> Result<PathBuf> {
    match &config.storage.path {
        Some(path) => Ok(path.clone()),
        None => FileStorage::default_path().context("Could not locate the session file"),
    }
}

/// Build gateway and session over the session file and restore what it holds
fn open_session(config: &Config, watch: bool) -> Result<SessionManager> {
    let path = storage_path(config)?;
    let storage: Arc<dyn Storage> = if watch {
        Arc::new(FileStorage::open(&path)?)
    } else {
        Arc::new(FileStorage::open_unwatched(&path)?)
    };

    let gateway = ApiGateway::connect(
        config.api.base_url.clone(),
        storage,
        config.api.gateway_defaults(),
    )?;
    let session = SessionManager::new(gateway, Arc::new(LogNavigator));
    session.check_auth_status();
    Ok(session)
}

fn require(session: &SessionManager, capability: Capability) -> Result<()> {
    match RouteGuard::check(&session.session(), capability) {
        GuardOutcome::Allowed => Ok(()),
        GuardOutcome::Loading => bail!("Session is still loading"),
        GuardOutcome::RedirectToLogin => {
            bail!("Not logged in. Run `clinicdesk login` first.")
        },
        GuardOutcome::Forbidden { role, required } => {
            let role = role.map(|r| r.to_string()).unwrap_or_else(|| "unknown".into());
            bail!("Role {} is not allowed to {:?}", role, required)
        },
    }
}

/// Message to show for a failed operation
fn describe(err: &ClinicError) -> String {
    match err.as_api() {
        Some(api) => api.user_message(),
        None => err.to_string(),
    }
}

async fn list(resource: Resource, gateway: &ApiGateway) -> ClinicResult<Value> {
    let gateway = gateway.clone();
    match resource {
        Resource::Patients => PatientService::new(gateway).list().await,
        Resource::Doctors => DoctorService::new(gateway).list().await,
        Resource::Clinics => ClinicService::new(gateway).list().await,
        Resource::Specialties => SpecialtyService::new(gateway).list_cached().await,
        Resource::Users => UserService::new(gateway).list().await,
        Resource::Appointments => {
            AppointmentService::new(gateway)
                .list(&AppointmentFilters::default())
                .await
        },
        Resource::Records => MedicalRecordService::new(gateway).list().await,
    }
}

async fn show(resource: Resource, gateway: &ApiGateway, id: &str) -> ClinicResult<Value> {
    let gateway = gateway.clone();
    match resource {
        Resource::Patients => PatientService::new(gateway).get(id).await,
        Resource::Doctors => DoctorService::new(gateway).get(id).await,
        Resource::Clinics => ClinicService::new(gateway).get(id).await,
        Resource::Specialties => SpecialtyService::new(gateway).get(id).await,
        Resource::Users => UserService::new(gateway).get(id).await,
        Resource::Appointments => AppointmentService::new(gateway).get(id).await,
        Resource::Records => MedicalRecordService::new(gateway).get(id).await,
    }
}

async fn delete(resource: Resource, gateway: &ApiGateway, id: &str) -> ClinicResult<Value> {
    let gateway = gateway.clone();
    match resource {
        Resource::Patients => PatientService::new(gateway).delete(id).await,
        Resource::Doctors => DoctorService::new(gateway).delete(id).await,
        Resource::Clinics => ClinicService::new(gateway).delete(id).await,
        Resource::Specialties => SpecialtyService::new(gateway).delete(id).await,
        Resource::Users => UserService::new(gateway).delete(id).await,
        Resource::Appointments => AppointmentService::new(gateway).delete(id).await,
        Resource::Records => MedicalRecordService::new(gateway).delete(id).await,
    }
}

fn print_value(value: &Value, json: bool) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
        return;
    }

    match value {
        Value::Array(items) if items.is_empty() => println!("{}", "(no records)".dimmed()),
        Value::Array(items) => {
            for item in items {
                println!("  • {}", summarize(item));
            }
            println!("{}", format!("{} record(s)", items.len()).dimmed());
        },
        Value::Object(fields) => {
            for (key, field) in fields {
                println!("  {}: {}", key.cyan(), render_field(key, field));
            }
        },
        other => println!("{}", other),
    }
}

/// One line per record: id plus the most descriptive field available
fn summarize(item: &Value) -> String {
    let id = item
        .get("id")
        .map(|id| render_field("id", id))
        .unwrap_or_else(|| "?".into());

    let text = |field: &str| item.get(field).and_then(Value::as_str).filter(|s| !s.is_empty());
    let label = match (text("first_name"), text("last_name")) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.to_string()),
        _ => text("name")
            .or_else(|| text("email"))
            .map(str::to_string)
            .or_else(|| text("scheduled_at").map(|s| format_scheduled_at(Some(s)))),
    };

    match label {
        Some(label) => format!("{} {}", format!("#{id}").yellow(), label),
        None => format!("#{id}").yellow().to_string(),
    }
}

fn render_field(key: &str, value: &Value) -> String {
    match (key, value) {
        ("scheduled_at", Value::String(s)) => format_scheduled_at(Some(s)),
        ("status", Value::String(s)) => AppointmentStatus::label_for(s),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    }
}

/// Show configuration and session status
fn show_status(cli: &Cli, config: &Config, session: &SessionManager) {
    println!("clinicdesk status:");
    println!();

    match (&cli.config, get_config_dir()) {
        (Some(path), _) => println!("  [OK] Configuration: {}", path.display()),
        (None, Ok(dir)) if dir.join("config.toml").exists() => {
            println!("  [OK] Configuration: {}", dir.join("config.toml").display())
        },
        _ => println!("  [WARNING] Configuration: Not found (using defaults)"),
    }
    println!("  [OK] Backend: {}", config.api.base_url);
    if let Ok(path) = storage_path(config) {
        println!("  [OK] Session file: {}", path.display());
    }

    match session.state() {
        SessionState::Authenticated { role, user_id } => {
            println!(
                "  {} Session: logged in as {} (user {})",
                "[OK]".green(),
                role.to_string().cyan(),
                user_id
            );
            let capabilities: Vec<String> = role
                .capabilities()
                .iter()
                .map(|c| format!("{c:?}"))
                .collect();
            println!("      • {}", capabilities.join(", "));
        },
        SessionState::Unauthenticated => {
            println!("  {} Session: not logged in", "[WARNING]".yellow())
        },
        SessionState::Loading => println!("  Session: loading"),
    }
    println!();
}

/// Print every session transition until interrupted
async fn watch_session(session: &SessionManager) -> Result<()> {
    session.spawn_storage_sync();
    let mut changes = session.subscribe();
    println!("Watching session (Ctrl-C to stop): {:?}", session.state());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                match state {
                    SessionState::Authenticated { role, user_id } => {
                        println!("{} logged in as {} (user {})", "→".green(), role, user_id)
                    },
                    SessionState::Unauthenticated => println!("{} logged out", "→".red()),
                    SessionState::Loading => {},
                }
            }
        }
    }
    Ok(())
}
