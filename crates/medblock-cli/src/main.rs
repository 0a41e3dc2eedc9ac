//! MedBlock CLI: `medblock` command.
//!
//! Operates on a registry file on behalf of one principal per invocation.
//! Every subcommand maps to one registry operation; the caller is named
//! with `--as` (e.g. `--as patient:pat_...`).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use medblock_registry::time::micros_to_rfc3339;
use medblock_registry::{
    AccessLevel, FileBackend, Identity, IdentityId, Principal, RegistryConfig, RegistryService,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn medblock_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| anyhow!("HOME not set; pass --store"))?;
    Ok(PathBuf::from(home).join(".medblock"))
}

fn default_store() -> Result<PathBuf> {
    Ok(medblock_dir()?.join("registry.json"))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// MedBlock CLI: register patients and doctors and control who may read
/// which medical record.
#[derive(Parser, Debug)]
#[command(
    name = "medblock",
    about = "MedBlock registry CLI",
    version,
    long_about = "medblock: MedBlock registry CLI\n\nRegister patients and doctors, give and revoke per-record access,\nand read records as an authenticated principal."
)]
struct Cli {
    /// Registry file (default: ~/.medblock/registry.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Registry configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this principal: patient:<id>, doctor:<id>, admin, or anonymous
    #[arg(long = "as", global = true, default_value = "anonymous")]
    principal: String,

    /// Name of an environment variable holding the store passphrase
    #[arg(long, global = true)]
    passphrase_env: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a patient
    AddPatient {
        #[arg(long)]
        name: String,

        #[arg(long, allow_hyphen_values = true)]
        age: i64,
    },

    /// Register a doctor
    AddDoctor {
        #[arg(long)]
        name: String,
    },

    /// Give a doctor access to a patient's record
    GiveAccess {
        /// Doctor ID (doc_...)
        #[arg(long)]
        doctor: String,

        /// Patient ID (default: the calling patient)
        #[arg(long)]
        patient: Option<String>,

        /// Access level (none, read, read_write)
        #[arg(long)]
        level: String,
    },

    /// Change the level a doctor holds on a patient's record
    ChangeAccess {
        #[arg(long)]
        doctor: String,

        #[arg(long)]
        patient: Option<String>,

        #[arg(long)]
        level: String,
    },

    /// Revoke a doctor's access to a patient's record
    RevokeAccess {
        #[arg(long)]
        doctor: String,

        #[arg(long)]
        patient: Option<String>,
    },

    /// Remove a doctor and every grant it holds
    RemoveDoctor {
        /// Doctor ID (default: the calling doctor)
        #[arg(long)]
        doctor: Option<String>,
    },

    /// Read a patient's record
    GetPatientData {
        /// Patient ID (default: the calling patient)
        patient: Option<String>,
    },

    /// Update a patient's name or age
    UpdatePatient {
        /// Patient ID (default: the calling patient)
        patient: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        age: Option<i64>,
    },

    /// Read a doctor's record
    GetDoctorData {
        /// Doctor ID (doc_...)
        doctor: String,
    },

    /// Show the level one doctor holds on one patient
    AccessLevel {
        #[arg(long)]
        doctor: String,

        #[arg(long)]
        patient: String,
    },

    /// Show the calling principal's own record
    ShowProfile,

    /// Connection counts and lists for the caller
    Dashboard {
        #[command(subcommand)]
        subcommand: DashboardCommands,
    },

    /// Inspect the mutation ledger
    Ledger {
        #[command(subcommand)]
        subcommand: LedgerCommands,
    },

    /// Show registry counters
    Stats,
}

#[derive(Subcommand, Debug)]
enum DashboardCommands {
    /// Doctors connected to the calling patient
    DoctorsConnected {
        /// List the doctor IDs instead of just counting them
        #[arg(long)]
        list: bool,
    },
    /// Patients connected to the calling doctor
    PatientsConnected {
        /// List the patient IDs instead of just counting them
        #[arg(long)]
        list: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// Show ledger events (admin only)
    Show {
        /// Only events with a sequence number above this
        #[arg(long, default_value_t = 0)]
        after: u64,
    },
    /// Verify the ledger hash chain
    Verify,
}

/// Settings shared by every command.
struct Session {
    store: PathBuf,
    config: Option<PathBuf>,
    passphrase_env: Option<String>,
    principal: Principal,
    json: bool,
    verbose: bool,
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = build_session(&cli).and_then(|session| run(&session, cli.command));

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn build_session(cli: &Cli) -> Result<Session> {
    let principal: Principal = cli
        .principal
        .parse()
        .with_context(|| format!("invalid --as value '{}'", cli.principal))?;
    let store = match &cli.store {
        Some(path) => path.clone(),
        None => default_store()?,
    };
    Ok(Session {
        store,
        config: cli.config.clone(),
        passphrase_env: cli.passphrase_env.clone(),
        principal,
        json: cli.json,
        verbose: cli.verbose,
    })
}

fn run(ctx: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::AddPatient { name, age } => cmd_add_patient(ctx, &name, age),
        Commands::AddDoctor { name } => cmd_add_doctor(ctx, &name),
        Commands::GiveAccess {
            doctor,
            patient,
            level,
        } => cmd_set_access(ctx, &doctor, patient.as_deref(), &level, false),
        Commands::ChangeAccess {
            doctor,
            patient,
            level,
        } => cmd_set_access(ctx, &doctor, patient.as_deref(), &level, true),
        Commands::RevokeAccess { doctor, patient } => {
            cmd_revoke_access(ctx, &doctor, patient.as_deref())
        }
        Commands::RemoveDoctor { doctor } => cmd_remove_doctor(ctx, doctor.as_deref()),
        Commands::GetPatientData { patient } => cmd_get_patient_data(ctx, patient.as_deref()),
        Commands::UpdatePatient { patient, name, age } => {
            cmd_update_patient(ctx, patient.as_deref(), name.as_deref(), age)
        }
        Commands::GetDoctorData { doctor } => cmd_get_doctor_data(ctx, &doctor),
        Commands::AccessLevel { doctor, patient } => cmd_access_level(ctx, &doctor, &patient),
        Commands::ShowProfile => cmd_show_profile(ctx),
        Commands::Dashboard { subcommand } => match subcommand {
            DashboardCommands::DoctorsConnected { list } => cmd_doctors_connected(ctx, list),
            DashboardCommands::PatientsConnected { list } => cmd_patients_connected(ctx, list),
        },
        Commands::Ledger { subcommand } => match subcommand {
            LedgerCommands::Show { after } => cmd_ledger_show(ctx, after),
            LedgerCommands::Verify => cmd_ledger_verify(ctx),
        },
        Commands::Stats => cmd_stats(ctx),
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn open_registry(ctx: &Session) -> Result<RegistryService> {
    let config = match &ctx.config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RegistryConfig::default(),
    };

    ensure_parent_dir(&ctx.store)?;
    let backend = match &ctx.passphrase_env {
        Some(var) => {
            let passphrase = std::env::var(var)
                .map_err(|_| anyhow!("environment variable {var} is not set"))?;
            if passphrase.is_empty() {
                return Err(anyhow!("passphrase in {var} cannot be empty"));
            }
            FileBackend::encrypted(&ctx.store, passphrase)
        }
        None => FileBackend::new(&ctx.store),
    };

    log::debug!("opening registry at {}", ctx.store.display());
    RegistryService::open(config, Box::new(backend))
        .with_context(|| format!("failed to open registry {}", ctx.store.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create registry directory {}", parent.display())
            })?;
        }
    }
    Ok(())
}

/// Resolve an optional patient argument, defaulting to the caller.
fn patient_arg(ctx: &Session, patient: Option<&str>) -> Result<IdentityId> {
    match (patient, &ctx.principal) {
        (Some(id), _) => Ok(IdentityId::from(id)),
        (None, Principal::Patient(id)) => Ok(id.clone()),
        (None, _) => Err(anyhow!(
            "no patient given and the caller is not a patient (use --patient or --as patient:<id>)"
        )),
    }
}

/// Resolve an optional doctor argument, defaulting to the caller.
fn doctor_arg(ctx: &Session, doctor: Option<&str>) -> Result<IdentityId> {
    match (doctor, &ctx.principal) {
        (Some(id), _) => Ok(IdentityId::from(id)),
        (None, Principal::Doctor(id)) => Ok(id.clone()),
        (None, _) => Err(anyhow!(
            "no doctor given and the caller is not a doctor (use --doctor or --as doctor:<id>)"
        )),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

// ── Command implementations ───────────────────────────────────────────────────

/// `medblock add-patient --name NAME --age AGE`
fn cmd_add_patient(ctx: &Session, name: &str, age: i64) -> Result<()> {
    let registry = open_registry(ctx)?;
    let id = registry.add_patient(&ctx.principal, name, age)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("Added patient '{}'", name.trim());
    println!("  ID:   {id}");
    if ctx.verbose {
        println!("  File: {}", ctx.store.display());
    }
    Ok(())
}

/// `medblock add-doctor --name NAME`
fn cmd_add_doctor(ctx: &Session, name: &str) -> Result<()> {
    let registry = open_registry(ctx)?;
    let id = registry.add_doctor(&ctx.principal, name)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("Added doctor '{}'", name.trim());
    println!("  ID:   {id}");
    if ctx.verbose {
        println!("  File: {}", ctx.store.display());
    }
    Ok(())
}

/// `medblock give-access` / `medblock change-access`
fn cmd_set_access(
    ctx: &Session,
    doctor: &str,
    patient: Option<&str>,
    level: &str,
    change: bool,
) -> Result<()> {
    let level: AccessLevel = level.parse()?;
    let doctor = IdentityId::from(doctor);
    let patient = patient_arg(ctx, patient)?;

    let registry = open_registry(ctx)?;
    if change {
        registry.change_access(&ctx.principal, &doctor, &patient, level)?;
    } else {
        registry.give_access(&ctx.principal, &doctor, &patient, level)?;
    }

    if ctx.json {
        return print_json(&serde_json::json!({
            "doctor": doctor,
            "patient": patient,
            "level": level,
        }));
    }
    println!("{} access", if change { "Changed" } else { "Gave" });
    println!("  Doctor:  {doctor}");
    println!("  Patient: {patient}");
    println!("  Level:   {level}");
    Ok(())
}

/// `medblock revoke-access --doctor ID [--patient ID]`
fn cmd_revoke_access(ctx: &Session, doctor: &str, patient: Option<&str>) -> Result<()> {
    let doctor = IdentityId::from(doctor);
    let patient = patient_arg(ctx, patient)?;

    let registry = open_registry(ctx)?;
    let revoked = registry.revoke_access(&ctx.principal, &doctor, &patient)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "revoked": revoked }));
    }
    if revoked {
        println!("Revoked access for {doctor} on {patient}");
    } else {
        println!("{doctor} held no access on {patient}");
    }
    Ok(())
}

/// `medblock remove-doctor [--doctor ID]`
fn cmd_remove_doctor(ctx: &Session, doctor: Option<&str>) -> Result<()> {
    let doctor = doctor_arg(ctx, doctor)?;
    let registry = open_registry(ctx)?;
    registry.remove_doctor(&ctx.principal, &doctor)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "removed": doctor }));
    }
    println!("Removed doctor {doctor}");
    Ok(())
}

/// `medblock get-patient-data [ID]`
fn cmd_get_patient_data(ctx: &Session, patient: Option<&str>) -> Result<()> {
    let patient = patient_arg(ctx, patient)?;
    let registry = open_registry(ctx)?;
    let record = registry.get_patient_data(&ctx.principal, &patient)?;

    if ctx.json {
        return print_json(&record);
    }
    println!("Patient: {}", record.id);
    println!("  Name:    {}", record.name);
    println!("  Age:     {}", record.age);
    println!("  Created: {}", micros_to_rfc3339(record.created_at));
    Ok(())
}

/// `medblock update-patient [ID] [--name NAME] [--age AGE]`
fn cmd_update_patient(
    ctx: &Session,
    patient: Option<&str>,
    name: Option<&str>,
    age: Option<i64>,
) -> Result<()> {
    if name.is_none() && age.is_none() {
        return Err(anyhow!("nothing to update (pass --name and/or --age)"));
    }
    let patient = patient_arg(ctx, patient)?;
    let registry = open_registry(ctx)?;
    let record = registry.update_patient_data(&ctx.principal, &patient, name, age)?;

    if ctx.json {
        return print_json(&record);
    }
    println!("Updated patient {}", record.id);
    println!("  Name: {}", record.name);
    println!("  Age:  {}", record.age);
    Ok(())
}

/// `medblock get-doctor-data ID`
fn cmd_get_doctor_data(ctx: &Session, doctor: &str) -> Result<()> {
    let doctor = IdentityId::from(doctor);
    let registry = open_registry(ctx)?;
    let record = registry.get_doctor_data(&ctx.principal, &doctor)?;

    if ctx.json {
        return print_json(&record);
    }
    println!("Doctor: {}", record.id);
    println!("  Name:    {}", record.name);
    println!("  Created: {}", micros_to_rfc3339(record.created_at));
    Ok(())
}

/// `medblock access-level --doctor ID --patient ID`
fn cmd_access_level(ctx: &Session, doctor: &str, patient: &str) -> Result<()> {
    let doctor = IdentityId::from(doctor);
    let patient = IdentityId::from(patient);
    let registry = open_registry(ctx)?;
    let level = registry.access_level(&ctx.principal, &doctor, &patient)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "level": level }));
    }
    println!("{level}");
    Ok(())
}

/// `medblock show-profile`
fn cmd_show_profile(ctx: &Session) -> Result<()> {
    let registry = open_registry(ctx)?;
    let profile = registry.show_profile(&ctx.principal)?;

    if ctx.json {
        return print_json(&profile);
    }
    match &profile {
        Identity::Patient(p) => {
            println!("Patient: {}", p.id);
            println!("  Name:    {}", p.name);
            println!("  Age:     {}", p.age);
            println!("  Created: {}", micros_to_rfc3339(p.created_at));
        }
        Identity::Doctor(d) => {
            println!("Doctor: {}", d.id);
            println!("  Name:    {}", d.name);
            println!("  Created: {}", micros_to_rfc3339(d.created_at));
        }
    }
    Ok(())
}

/// `medblock dashboard doctors-connected [--list]`
fn cmd_doctors_connected(ctx: &Session, list: bool) -> Result<()> {
    let registry = open_registry(ctx)?;
    let doctors = registry.connected_doctors(&ctx.principal)?;

    if ctx.json {
        return if list {
            print_json(&doctors)
        } else {
            print_json(&serde_json::json!({ "count": doctors.len() }))
        };
    }
    println!("{}", doctors.len());
    if list {
        for id in &doctors {
            println!("  {id}");
        }
    }
    Ok(())
}

/// `medblock dashboard patients-connected [--list]`
fn cmd_patients_connected(ctx: &Session, list: bool) -> Result<()> {
    let registry = open_registry(ctx)?;
    let patients = registry.connected_patients(&ctx.principal)?;

    if ctx.json {
        return if list {
            print_json(&patients)
        } else {
            print_json(&serde_json::json!({ "count": patients.len() }))
        };
    }
    println!("{}", patients.len());
    if list {
        for id in &patients {
            println!("  {id}");
        }
    }
    Ok(())
}

/// `medblock ledger show [--after N]`
fn cmd_ledger_show(ctx: &Session, after: u64) -> Result<()> {
    let registry = open_registry(ctx)?;
    let events = registry.events(&ctx.principal, after)?;

    if ctx.json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No events");
        return Ok(());
    }
    for event in &events {
        println!(
            "#{:<5} {}  {:<16} by {}",
            event.sequence,
            micros_to_rfc3339(event.timestamp),
            event.kind.as_tag(),
            event.actor
        );
        if ctx.verbose {
            println!("       hash: {}", event.event_hash);
        }
    }
    Ok(())
}

/// `medblock ledger verify`
fn cmd_ledger_verify(ctx: &Session) -> Result<()> {
    let registry = open_registry(ctx)?;
    registry.verify_ledger()?;
    let stats = registry.stats()?;

    if ctx.json {
        return print_json(&serde_json::json!({ "valid": true, "events": stats.events }));
    }
    println!("Ledger: valid ({} events)", stats.events);
    Ok(())
}

/// `medblock stats`
fn cmd_stats(ctx: &Session) -> Result<()> {
    let registry = open_registry(ctx)?;
    let stats = registry.stats()?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "patients": stats.patients,
            "active_doctors": stats.active_doctors,
            "grants": stats.grants,
            "events": stats.events,
            "revision": stats.revision,
        }));
    }
    println!("Registry: {}", ctx.store.display());
    println!("  Patients:       {}", stats.patients);
    println!("  Active doctors: {}", stats.active_doctors);
    println!("  Grants:         {}", stats.grants);
    println!("  Events:         {}", stats.events);
    println!("  Revision:       {}", stats.revision);
    Ok(())
}
