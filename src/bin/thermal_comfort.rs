//! Thermal Comfort CLI
//!
//! Commands:
//! - compute: Compute indices for one temperature/humidity(/pressure) reading
//! - replay: Run a group configuration against a stream of source state changes
//! - migrate: Migrate legacy identifiers in a registry file
//! - kinds: List supported index kinds
//! - doctor: Check a configuration file and the environment

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use thermal_comfort::adapters::{MemoryRegistry, MemoryStateStore, RecordingPublisher};
use thermal_comfort::index;
use thermal_comfort::types::{Kind, LegacyKind, PublishedIndex};
use thermal_comfort::{
    ComfortConfig, ComfortError, ComfortHub, GroupConfig, RecordEncoder, ENGINE_VERSION,
    PRODUCER_NAME, SCHEMA_VERSION,
};

/// Environment variable overriding the log filter
const LOG_ENV: &str = "THERMAL_COMFORT_LOG";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Thermal Comfort - comfort indices from temperature and humidity
#[derive(Parser)]
#[command(name = "thermal-comfort")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Compute thermal comfort indices and perceptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute indices for a single reading
    Compute {
        /// Temperature (°C), raw state accepted
        #[arg(short, long, allow_hyphen_values = true)]
        temperature: String,

        /// Relative humidity (%), raw state accepted
        #[arg(short = 'H', long, allow_hyphen_values = true)]
        humidity: String,

        /// Station pressure (hPa)
        #[arg(short, long)]
        pressure: Option<String>,

        /// Kinds to compute, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<Kind>,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// Replay source state changes through configured groups
    Replay {
        /// Group configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// NDJSON events (use - for stdin)
        #[arg(short, long, default_value = "-")]
        events: PathBuf,

        /// Registry file with source identifiers and prior index records
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Write the registry after replay
        #[arg(long)]
        save_registry: Option<PathBuf>,

        /// Directory of measurement caches, restored before and saved after replay
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Migrate legacy identifiers of one configuration entry
    Migrate {
        /// Registry file (JSON list of entries)
        #[arg(short, long)]
        registry: PathBuf,

        /// Configuration entry id
        #[arg(long)]
        entry_id: String,

        /// Schema version the entry is stored at
        #[arg(long, default_value = "1")]
        from_version: u32,

        /// Write the migrated registry here (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported index kinds
    Kinds {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check configuration and environment
    Doctor {
        /// Configuration file to validate
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human readable
    Text,
    /// Pretty JSON
    Json,
    /// One JSON batch per line
    Ndjson,
}

/// One line of a replay stream.
///
/// An entry with `entity_id` sets that source; a null `state` removes it.
/// An entry without `entity_id` is a clock tick that runs due polls.
#[derive(Deserialize)]
struct ReplayEvent {
    #[serde(default)]
    at: Option<DateTime<Utc>>,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr subscriber once. `THERMAL_COMFORT_LOG` wins over `RUST_LOG`.
fn init_logging() {
    if LOGGING_INIT.get().is_some() {
        return;
    }

    let level = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let initialized = fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok();
    LOGGING_INIT.set(()).ok();

    if initialized {
        tracing::debug!(level = level.as_str(), "logging initialized");
    }
}

fn run(cli: Cli) -> Result<(), ComfortCliError> {
    match cli.command {
        Commands::Compute {
            temperature,
            humidity,
            pressure,
            kinds,
            output_format,
        } => cmd_compute(&temperature, &humidity, pressure.as_deref(), &kinds, output_format),

        Commands::Replay {
            config,
            events,
            registry,
            save_registry,
            cache_dir,
            output_format,
        } => cmd_replay(
            &config,
            &events,
            registry.as_deref(),
            save_registry.as_deref(),
            cache_dir.as_deref(),
            output_format,
        ),

        Commands::Migrate {
            registry,
            entry_id,
            from_version,
            output,
        } => cmd_migrate(&registry, &entry_id, from_version, output.as_deref()),

        Commands::Kinds { json } => cmd_kinds(json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_compute(
    temperature: &str,
    humidity: &str,
    pressure: Option<&str>,
    kinds: &[Kind],
    output_format: OutputFormat,
) -> Result<(), ComfortCliError> {
    const TEMPERATURE_SOURCE: &str = "sensor.temperature";
    const HUMIDITY_SOURCE: &str = "sensor.humidity";
    const PRESSURE_SOURCE: &str = "sensor.pressure";

    let mut group = GroupConfig::new("cli", TEMPERATURE_SOURCE, HUMIDITY_SOURCE).with_unique_id("cli");
    if !kinds.is_empty() {
        group = group.with_sensor_types(kinds);
    }
    let mut store = MemoryStateStore::new();
    store.set(TEMPERATURE_SOURCE, temperature);
    store.set(HUMIDITY_SOURCE, humidity);
    if let Some(pressure) = pressure {
        group = group.with_pressure_sensor(PRESSURE_SOURCE);
        store.set(PRESSURE_SOURCE, pressure);
    }

    let now = Utc::now();
    let mut hub = ComfortHub::new();
    let mut registry = MemoryRegistry::new();
    let mut publisher = RecordingPublisher::new();
    hub.setup_group(
        group.resolve(&ComfortConfig::default())?,
        &mut registry,
        &store,
        &mut publisher,
        now,
    )?;

    let indices: Vec<PublishedIndex> = publisher.current().cloned().collect();
    print!("{}", format_output(&indices, &output_format, now)?);
    Ok(())
}

fn cmd_replay(
    config_path: &Path,
    events_path: &Path,
    registry_path: Option<&Path>,
    save_registry: Option<&Path>,
    cache_dir: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), ComfortCliError> {
    let config = ComfortConfig::from_json(&fs::read_to_string(config_path)?)?;
    let groups = config.resolve()?;
    let mut registry = match registry_path {
        Some(path) => MemoryRegistry::from_json(&fs::read_to_string(path)?)?,
        None => MemoryRegistry::new(),
    };

    let lines = read_lines(events_path)?;
    let mut events = Vec::new();
    for (number, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line)
            .map_err(|e| ComfortCliError::ParseError(format!("line {}: {e}", number + 1)))?;
        events.push(event);
    }
    if events.is_empty() {
        return Err(ComfortCliError::NoEvents);
    }

    let start = events.iter().find_map(|e| e.at).unwrap_or_else(Utc::now);
    let mut hub = ComfortHub::new();
    let mut store = MemoryStateStore::new();
    let mut publisher = RecordingPublisher::new();
    let encoder = RecordEncoder::new();
    let mut clock = start;

    for group in groups {
        hub.setup_group(group, &mut registry, &store, &mut publisher, start)?;
    }
    if let Some(dir) = cache_dir {
        if dir.exists() {
            hub.restore_caches_from(dir)?;
        }
    }
    info!(groups = hub.len(), events = events.len(), "replaying");

    let streaming = matches!(output_format, OutputFormat::Ndjson);
    if streaming {
        emit_line(&encoder, &publisher.take_history(), clock)?;
    }

    for event in events {
        clock = event.at.unwrap_or(clock);
        let published = match event.entity_id {
            Some(entity_id) => {
                match event.state {
                    Some(state) => store.set(&entity_id, &state),
                    None => {
                        store.remove(&entity_id);
                    }
                }
                hub.handle_state_change(&entity_id, &store, &mut publisher, clock)
            }
            None => hub.tick(&store, &mut publisher, clock),
        };
        if streaming {
            emit_line(&encoder, &published, clock)?;
        }
    }

    if !streaming {
        let indices: Vec<PublishedIndex> = publisher.current().cloned().collect();
        print!("{}", format_output(&indices, &output_format, clock)?);
    }

    if let Some(path) = save_registry {
        fs::write(path, registry.to_json()?)?;
    }
    if let Some(dir) = cache_dir {
        hub.save_caches_to(dir)?;
    }
    Ok(())
}

fn cmd_migrate(
    registry_path: &Path,
    entry_id: &str,
    from_version: u32,
    output: Option<&Path>,
) -> Result<(), ComfortCliError> {
    let mut registry = MemoryRegistry::from_json(&fs::read_to_string(registry_path)?)?;
    let report = ComfortHub::new().migrate_entry(&mut registry, entry_id, from_version)?;

    match output {
        Some(path) if path.to_string_lossy() == "-" => println!("{}", registry.to_json()?),
        Some(path) => {
            fs::write(path, registry.to_json()?)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn cmd_kinds(json: bool) -> Result<(), ComfortCliError> {
    let kinds: Vec<KindInfo> = index::definitions()
        .iter()
        .map(|definition| KindInfo {
            token: definition.kind.as_str(),
            name: definition.kind.display_name(),
            inputs: definition.required.iter().map(|r| r.attribute()).collect(),
            optional_inputs: definition.optional.iter().map(|r| r.attribute()).collect(),
            attribute: definition.attribute,
            legacy_aliases: LegacyKind::ALL
                .iter()
                .filter(|legacy| legacy.canonical() == definition.kind)
                .map(|legacy| legacy.as_str())
                .collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&kinds)?);
        return Ok(());
    }

    println!("Supported Kinds");
    println!("===============");
    for kind in &kinds {
        let mut inputs = kind.inputs.join(", ");
        if !kind.optional_inputs.is_empty() {
            inputs.push_str(&format!(" [{}]", kind.optional_inputs.join(", ")));
        }
        print!("  {:<30} {:<30} {}", kind.token, kind.name, inputs);
        if !kind.legacy_aliases.is_empty() {
            print!("  (legacy: {})", kind.legacy_aliases.join(", "));
        }
        println!();
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ComfortCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Thermal Comfort version {ENGINE_VERSION}"),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Identifier schema: {SCHEMA_VERSION}"),
    });

    if let Some(config_path) = config {
        checks.push(check_config(config_path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Thermal Comfort Doctor Report");
        println!("=============================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ComfortCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    let name = "config".to_string();
    if !path.exists() {
        return DoctorCheck {
            name,
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        };
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return DoctorCheck {
                name,
                status: CheckStatus::Error,
                message: format!("Cannot read configuration file: {e}"),
            }
        }
    };

    match ComfortConfig::from_json(&content).and_then(|config| config.resolve()) {
        Ok(groups) if groups.is_empty() => DoctorCheck {
            name,
            status: CheckStatus::Warning,
            message: "Configuration is valid but defines no groups".to_string(),
        },
        Ok(groups) => {
            let indices: usize = groups.iter().map(|g| g.enabled_kinds.len()).sum();
            let polling = groups
                .iter()
                .filter(|g| g.update_mode.poll_interval().is_some())
                .count();
            DoctorCheck {
                name,
                status: CheckStatus::Ok,
                message: format!(
                    "{} groups, {indices} indices, {polling} polling",
                    groups.len()
                ),
            }
        }
        Err(e) => DoctorCheck {
            name,
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ComfortCliError> {
    if path.to_string_lossy() == "-" {
        let mut lines = Vec::new();
        for line in io::stdin().lock().lines() {
            lines.push(line?);
        }
        Ok(lines)
    } else {
        let mut content = String::new();
        fs::File::open(path)?.read_to_string(&mut content)?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

fn emit_line(
    encoder: &RecordEncoder,
    indices: &[PublishedIndex],
    at: DateTime<Utc>,
) -> Result<(), ComfortCliError> {
    if !indices.is_empty() {
        println!("{}", encoder.encode_to_line(indices, at)?);
    }
    Ok(())
}

fn format_output(
    indices: &[PublishedIndex],
    format: &OutputFormat,
    at: DateTime<Utc>,
) -> Result<String, ComfortCliError> {
    let encoder = RecordEncoder::new();
    match format {
        OutputFormat::Json => Ok(encoder.encode_to_json(indices, at)? + "\n"),
        OutputFormat::Ndjson => Ok(encoder.encode_to_line(indices, at)? + "\n"),
        OutputFormat::Text => {
            let mut output = String::new();
            for index in indices {
                output.push_str(&format!(
                    "{:<30} {}\n",
                    index.kind.as_str(),
                    index.state.as_state_string()
                ));
            }
            Ok(output)
        }
    }
}

// Error types

#[derive(Debug)]
enum ComfortCliError {
    Io(io::Error),
    Engine(ComfortError),
    Json(serde_json::Error),
    NoEvents,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for ComfortCliError {
    fn from(e: io::Error) -> Self {
        ComfortCliError::Io(e)
    }
}

impl From<ComfortError> for ComfortCliError {
    fn from(e: ComfortError) -> Self {
        ComfortCliError::Engine(e)
    }
}

impl From<serde_json::Error> for ComfortCliError {
    fn from(e: serde_json::Error) -> Self {
        ComfortCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ComfortCliError> for CliError {
    fn from(e: ComfortCliError) -> Self {
        match e {
            ComfortCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ComfortCliError::Engine(e) => {
                let (code, hint) = match &e {
                    ComfortError::InvalidConfig(_) | ComfortError::UnknownKind(_) => {
                        ("CONFIG_ERROR", "Run 'thermal-comfort doctor --config <file>'")
                    }
                    ComfortError::UnresolvableSource(_) => (
                        "UNRESOLVABLE_SOURCE",
                        "Set unique_id or pass --registry with the source entities",
                    ),
                    ComfortError::IdentifierConflict(_) => {
                        ("IDENTIFIER_CONFLICT", "Choose a different unique_id")
                    }
                    ComfortError::Migration(_) => ("MIGRATION_ERROR", "Check --from-version"),
                    _ => ("ENGINE_ERROR", "See message for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ComfortCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ComfortCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure the event stream is not empty".to_string()),
            },
            ComfortCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            ComfortCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be {\"at\", \"entity_id\", \"state\"}".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct KindInfo {
    token: &'static str,
    name: String,
    inputs: Vec<&'static str>,
    optional_inputs: Vec<&'static str>,
    attribute: Option<&'static str>,
    legacy_aliases: Vec<&'static str>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
