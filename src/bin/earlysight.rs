//! Earlysight CLI - Command-line interface for the Earlysight screening engine
//!
//! Commands:
//! - replay: Run a recorded session (NDJSON frame records) into a screening report
//! - fuse: Combine a questionnaire probability and a video score
//! - doctor: Diagnose configuration and emotion service health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use earlysight::config::EmotionBackend;
use earlysight::emotion::{EmotionClassifier, RemoteEmotionClient};
use earlysight::encoder::ScreeningReport;
use earlysight::logging::init_logging;
use earlysight::{
    fuse_scores, EngineConfig, Frame, FrameRecord, FrameSampler, QuestionnaireInput,
    ScreeningProcessor, ENGINE_VERSION, PRODUCER_NAME,
};
use tracing::{info, warn};

/// Earlysight - Behavioral-signal engine for early autism-risk screening
#[derive(Parser)]
#[command(name = "earlysight")]
#[command(author = "Earlysight Contributors")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Extract behavioral signals from video sessions and fuse risk scores", long_about = None)]
struct Cli {
    /// Log level filter (overrides config and EARLYSIGHT_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded frames through a session and print the screening report
    Replay {
        /// Input NDJSON file of frame records (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Session identifier
        #[arg(long, default_value = "replay")]
        session_id: String,

        /// Session duration in seconds (defaults to the observed frame span)
        #[arg(long)]
        duration: Option<f64>,

        /// Questionnaire risk probability (0-1)
        #[arg(long)]
        questionnaire: Option<f64>,

        /// Questionnaire model confidence (0-1)
        #[arg(long)]
        confidence: Option<f64>,

        /// Sampling rate applied to recorded frames (0 keeps every frame)
        #[arg(long, default_value = "10")]
        sample_fps: f64,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip facial expression analysis
        #[arg(long)]
        no_emotion: bool,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Fuse a questionnaire probability with a video score
    Fuse {
        /// Questionnaire risk probability (0-1)
        #[arg(long)]
        questionnaire: Option<f64>,

        /// Video behavior score (0-100)
        #[arg(long)]
        video: Option<f64>,

        /// Questionnaire model confidence (0-1)
        #[arg(long)]
        confidence: Option<f64>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration and service health
    Doctor {
        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), EarlysightCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            session_id,
            duration,
            questionnaire,
            confidence,
            sample_fps,
            config,
            no_emotion,
            output_format,
        } => {
            let mut config = load_config(config.as_deref())?;
            if no_emotion {
                config.emotion.backend = EmotionBackend::Disabled;
            }
            setup_logging(&mut config, cli.log_level, cli.log_json);

            let questionnaire = questionnaire.map(|probability| QuestionnaireInput {
                probability,
                confidence,
            });
            cmd_replay(
                config,
                &input,
                &output,
                &session_id,
                duration,
                questionnaire,
                sample_fps,
                output_format,
            )
            .await
        }

        Commands::Fuse {
            questionnaire,
            video,
            confidence,
            output_format,
        } => {
            let mut config = EngineConfig::from_env();
            setup_logging(&mut config, cli.log_level, cli.log_json);
            let combined = fuse_scores(questionnaire, video, confidence)?;
            println!("{}", format_output(&combined, output_format)?);
            Ok(())
        }

        Commands::Doctor { config, json } => {
            let mut loaded = EngineConfig::from_env();
            setup_logging(&mut loaded, cli.log_level, cli.log_json);
            cmd_doctor(config.as_deref(), json).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, EarlysightCliError> {
    let config = match path {
        Some(path) => EngineConfig::from_json_file(path)?.with_env_overrides(),
        None => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn setup_logging(config: &mut EngineConfig, level: Option<String>, json: bool) {
    if let Some(level) = level {
        config.logging.level = level;
    }
    config.logging.json |= json;
    init_logging(&config.logging);
}

#[allow(clippy::too_many_arguments)]
async fn cmd_replay(
    config: EngineConfig,
    input: &PathBuf,
    output: &PathBuf,
    session_id: &str,
    duration: Option<f64>,
    questionnaire: Option<QuestionnaireInput>,
    sample_fps: f64,
    output_format: OutputFormat,
) -> Result<(), EarlysightCliError> {
    let frames = read_frames(input)?;
    if frames.is_empty() {
        return Err(EarlysightCliError::NoFrames);
    }

    let processor = ScreeningProcessor::new(config)?;
    let ack = processor.manager().start_session(session_id).await?;
    info!(
        session_id,
        frames = frames.len(),
        emotion_available = ack.emotion_available,
        "Replaying recorded session"
    );

    let mut sampler = FrameSampler::new(sample_fps);
    let stats = processor.ingest_batch(session_id, frames, &mut sampler).await?;
    info!(
        read = stats.frames_read,
        sampled = stats.frames_sampled,
        processed = stats.frames_processed,
        "Frames ingested"
    );

    // Non-positive durations fall back to the observed frame span
    let report = processor
        .finish(session_id, duration.unwrap_or(0.0), questionnaire)
        .await?;

    write_output(output, &format_report(&report, output_format)?)?;
    Ok(())
}

fn read_frames(input: &PathBuf) -> Result<Vec<Frame>, EarlysightCliError> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut frames = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(line)
            .map_err(|e| EarlysightCliError::ParseError(format!("line {}: {}", line_no + 1, e)))?;
        let timestamp = record.timestamp;
        let frame = record.into_frame().unwrap_or_else(|e| {
            // Keep the frame so the session counts it as malformed
            warn!(line = line_no + 1, error = %e, "Unreadable frame payload");
            Frame::encoded(timestamp, Vec::new())
        });
        frames.push(frame);
    }
    Ok(frames)
}

fn write_output(output: &PathBuf, content: &str) -> Result<(), EarlysightCliError> {
    if output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", content)?;
    } else {
        fs::write(output, format!("{}\n", content))?;
    }
    Ok(())
}

async fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), EarlysightCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Earlysight version {}", ENGINE_VERSION),
    });

    let config = match config_path {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Config file {} does not exist", path.display()),
            });
            None
        }
        Some(path) => match EngineConfig::from_json_file(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config file {} is valid", path.display()),
                });
                Some(config.with_env_overrides())
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                });
                None
            }
        },
        None => {
            let config = EngineConfig::from_env();
            let (status, message) = match config.validate() {
                Ok(()) => (CheckStatus::Ok, "Using defaults with environment overrides".to_string()),
                Err(e) => (CheckStatus::Error, format!("Invalid environment overrides: {}", e)),
            };
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status,
                message,
            });
            Some(config)
        }
    };

    if let Some(config) = &config {
        checks.push(check_emotion_service(config).await);
    }

    checks.push(DoctorCheck {
        name: "landmark_model".to_string(),
        status: CheckStatus::Warning,
        message: "No landmark model bundled; replay needs frames with precomputed landmarks"
            .to_string(),
    });

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
            message: "stdin is a pipe (replay with --input - ready)".to_string(),
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
        println!("Earlysight Doctor Report");
        println!("========================");
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
        Err(EarlysightCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

async fn check_emotion_service(config: &EngineConfig) -> DoctorCheck {
    let name = "emotion_service".to_string();
    if config.emotion.backend == EmotionBackend::Disabled {
        return DoctorCheck {
            name,
            status: CheckStatus::Warning,
            message: "Emotion classification disabled; expression variability will be unavailable"
                .to_string(),
        };
    }

    match RemoteEmotionClient::new(&config.emotion) {
        Ok(client) => {
            if client.health_check().await {
                DoctorCheck {
                    name,
                    status: CheckStatus::Ok,
                    message: format!("Emotion service healthy at {}", client.health_url()),
                }
            } else {
                DoctorCheck {
                    name,
                    status: CheckStatus::Warning,
                    message: format!(
                        "Emotion service unreachable at {}; sessions will run without expression analysis",
                        client.health_url()
                    ),
                }
            }
        }
        Err(e) => DoctorCheck {
            name,
            status: CheckStatus::Error,
            message: format!("Cannot build emotion client: {}", e),
        },
    }
}

// Helper functions

fn format_output<T: serde::Serialize>(value: &T, format: OutputFormat) -> Result<String, EarlysightCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn format_report(report: &ScreeningReport, format: OutputFormat) -> Result<String, EarlysightCliError> {
    format_output(report, format)
}

// Error types

#[derive(Debug)]
enum EarlysightCliError {
    Io(io::Error),
    Screening(earlysight::ScreeningError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for EarlysightCliError {
    fn from(e: io::Error) -> Self {
        EarlysightCliError::Io(e)
    }
}

impl From<earlysight::ScreeningError> for EarlysightCliError {
    fn from(e: earlysight::ScreeningError) -> Self {
        EarlysightCliError::Screening(e)
    }
}

impl From<serde_json::Error> for EarlysightCliError {
    fn from(e: serde_json::Error) -> Self {
        EarlysightCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EarlysightCliError> for CliError {
    fn from(e: EarlysightCliError) -> Self {
        use earlysight::ScreeningError;

        match e {
            EarlysightCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EarlysightCliError::Screening(e) => {
                let (code, hint) = match &e {
                    ScreeningError::InvalidScore(_) => (
                        "INVALID_SCORE",
                        "Questionnaire probability and confidence are 0-1; video score is 0-100",
                    ),
                    ScreeningError::NoScoreSources => (
                        "NO_SCORE_SOURCES",
                        "Pass --questionnaire, --video, or both",
                    ),
                    ScreeningError::InvalidSession(_) => (
                        "INVALID_SESSION",
                        "Use a fresh --session-id",
                    ),
                    ScreeningError::Config(_) => (
                        "CONFIG_ERROR",
                        "Run 'earlysight doctor --config <file>' for details",
                    ),
                    _ => ("SCREENING_ERROR", "Run 'earlysight doctor' to check the setup"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EarlysightCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EarlysightCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure the input has one frame record per line".to_string()),
            },
            EarlysightCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            EarlysightCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be a frame record: {\"timestamp\": .., \"landmarks\": ..}".to_string()),
            },
        }
    }
}

// Report types

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
