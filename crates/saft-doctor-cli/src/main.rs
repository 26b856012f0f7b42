//! SAFT Doctor CLI: validate, auto-fix and submit Portuguese SAF-T files.
//!
//! Configuration comes from SAFT_DOCTOR_* environment variables (or a `.env`
//! file); `--api-url` and `--token` override them.

use anyhow::Context;
use bytes::Bytes;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use saft_doctor_autofix::{AutoFixConfig, AutoFixLoop};
use saft_doctor_cli::{
    documents_exit_code, format_progress, init_tracing, parse_selection, parse_suggestion,
    render_documents_table, render_report, render_validation, report_exit_code,
    validation_exit_code,
};
use saft_doctor_client::{
    ApiClient, Heartbeat, HeartbeatEvent, SubmitTarget, Uploader, ValidationSource,
};
use saft_doctor_core::models::{
    DocumentSource, FixRule, Operation, UploadSession, ValidationOptions, ValidationResult,
};
use saft_doctor_core::{
    ClientConfig, ClientError, ErrorMetadata, LogLevel, SuggestionSelections,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "saft-doctor", about = "SAFT Doctor validation client", version)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "SAFT_DOCTOR_API_URL")]
    api_url: Option<String>,

    /// Bearer token from `saft-doctor login`
    #[arg(long, global = true, env = "SAFT_DOCTOR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the token export line
    Login {
        #[arg(long, env = "SAFT_DOCTOR_USERNAME")]
        username: String,
        #[arg(long, env = "SAFT_DOCTOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Upload a SAFT file in chunks and print its upload id
    Upload {
        /// Path to the SAFT XML file
        file: PathBuf,
    },
    /// Validate a file: by object key if given, otherwise upload and validate
    Validate {
        /// Path to the SAFT XML file
        file: Option<PathBuf>,
        /// Validate a file already in object storage
        #[arg(long)]
        object_key: Option<String>,
        /// Fix issues automatically after validating an upload
        #[arg(long)]
        auto_fix: bool,
        /// Submit to the tax authority once the file is clean
        #[arg(long)]
        submit: bool,
        /// Maximum number of fix rounds
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Run the auto-fix loop on an existing upload
    AutoFix {
        /// Upload id returned by `upload`
        upload_id: String,
        /// Submit to the tax authority once the file is clean
        #[arg(long)]
        submit: bool,
        /// Maximum number of fix rounds
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Choose suggestion J for issue I in the first round (I:J, zero-based)
        #[arg(long = "select", value_name = "I:J")]
        selections: Vec<String>,
    },
    /// Submit a file to the tax authority
    #[command(group(ArgGroup::new("target").required(true).args(["upload_id", "file"])))]
    Submit {
        #[arg(long)]
        upload_id: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Validate by sending the whole file in one request
    Direct {
        /// Path to the SAFT XML file
        file: PathBuf,
        /// Ask the backend not to keep the file
        #[arg(long)]
        dry_run: bool,
    },
    /// List the invoices in an uploaded or archived file
    #[command(group(ArgGroup::new("source").required(true).args(["upload_id", "storage_key"])))]
    Documents {
        #[arg(long)]
        upload_id: Option<String>,
        #[arg(long)]
        storage_key: Option<String>,
    },
    /// Save a custom fix rule
    FixRule {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Issue code the rule produces
        #[arg(long)]
        code: String,
        /// Regular expression matched against validator messages
        #[arg(long)]
        pattern: String,
        /// Suggested fix as label:reason:code (repeatable)
        #[arg(long = "suggestion", value_name = "LABEL:REASON:CODE")]
        suggestions: Vec<String>,
    },
    /// Watch backend health until Ctrl-C
    Heartbeat,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn print_validation(format: OutputFormat, result: &ValidationResult) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            print!("{}", render_validation(result));
            Ok(())
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping after the current request");
            token.cancel();
        }
    });
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("saft.xml")
        .to_string()
}

async fn read_file(path: &Path) -> anyhow::Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .map_err(ClientError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(data))
}

async fn upload(
    client: &ApiClient,
    config: &ClientConfig,
    path: &Path,
) -> anyhow::Result<UploadSession> {
    let session = Uploader::new(client)
        .with_fallback_chunk_size(config.default_chunk_size)
        .on_progress(|p| eprintln!("{}", format_progress(&p)))
        .upload_path(path)
        .await?;
    eprintln!(
        "Upload complete: {} ({} bytes)",
        session.upload_id, session.total_size
    );
    Ok(session)
}

fn loop_config(
    config: &ClientConfig,
    max_iterations: Option<u32>,
    submit: bool,
) -> AutoFixConfig {
    AutoFixConfig {
        max_iterations: max_iterations
            .filter(|n| *n > 0)
            .unwrap_or(config.max_fix_iterations),
        should_submit: submit,
        ..AutoFixConfig::from_client_config(config)
    }
}

async fn run_loop(
    client: &ApiClient,
    config: AutoFixConfig,
    upload_id: &str,
    initial: ValidationResult,
    selections: Option<&SuggestionSelections>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = AutoFixLoop::new(client.clone(), config)
        .resume(upload_id, initial, selections, &cancel)
        .await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            if let Some(last) = report.last_result.as_ref().filter(|_| !report.converged()) {
                print!("{}", render_validation(last));
            }
            print!("{}", render_report(&report));
        }
    }
    Ok(ExitCode::from(report_exit_code(&report)))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if cli.token.is_some() {
        config.token = cli.token;
    }
    config.validate()?;

    let mut client = ApiClient::from_config(&config)?;
    let format = cli.format;

    match cli.command {
        Commands::Login { username, password } => {
            let login = client.login(&username, &password).await?;
            let me = client.me().await.ok();
            match format {
                OutputFormat::Json => print_json(&login)?,
                OutputFormat::Table => {
                    if let Some(me) = me {
                        eprintln!(
                            "Logged in as {} ({})",
                            me.username.as_deref().unwrap_or(&username),
                            me.role
                        );
                    }
                    println!("export SAFT_DOCTOR_TOKEN={}", login.access_token);
                }
            }
        }
        Commands::Upload { file } => {
            let session = upload(&client, &config, &file).await?;
            match format {
                OutputFormat::Json => print_json(&session)?,
                OutputFormat::Table => println!("{}", session.upload_id),
            }
        }
        Commands::Validate {
            file,
            object_key,
            auto_fix,
            submit,
            max_iterations,
        } => {
            if let Some(key) = object_key {
                let result = client
                    .validate(
                        ValidationSource::ObjectKey(key),
                        Operation::Validar,
                        ValidationOptions::default(),
                    )
                    .await?;
                print_validation(format, &result)?;
                return Ok(ExitCode::from(validation_exit_code(&result)));
            }

            let file = file.context("Provide a FILE or --object-key")?;
            let session = upload(&client, &config, &file).await?;
            let result = client
                .validate(
                    ValidationSource::Upload(session.upload_id.clone()),
                    Operation::Validar,
                    ValidationOptions::default(),
                )
                .await?;

            if auto_fix && result.has_issues() {
                let config = loop_config(&config, max_iterations, submit);
                return run_loop(&client, config, &session.upload_id, result, None, format).await;
            }

            print_validation(format, &result)?;
            let mut code = validation_exit_code(&result);
            if submit && code == 0 {
                eprintln!("Submitting {} to the tax authority", session.upload_id);
                let submitted = client
                    .submit(SubmitTarget::Upload(session.upload_id.clone()))
                    .await?;
                print_validation(format, &submitted)?;
                code = validation_exit_code(&submitted);
            }
            return Ok(ExitCode::from(code));
        }
        Commands::AutoFix {
            upload_id,
            submit,
            max_iterations,
            selections,
        } => {
            let initial = client
                .validate(
                    ValidationSource::Upload(upload_id.clone()),
                    Operation::Validar,
                    ValidationOptions::default(),
                )
                .await?;

            let mut chosen = SuggestionSelections::new();
            for spec in &selections {
                let (issue, suggestion) = parse_selection(spec)?;
                match chosen.select(&initial.issues, issue, suggestion) {
                    Some(effective) if effective != suggestion => eprintln!(
                        "Issue {} has fewer suggestions; using option {}",
                        issue, effective
                    ),
                    Some(_) => {}
                    None => eprintln!("Issue {} offers no choice; selection ignored", issue),
                }
            }

            let config = loop_config(&config, max_iterations, submit);
            let selections = (!chosen.is_empty()).then_some(&chosen);
            return run_loop(&client, config, &upload_id, initial, selections, format).await;
        }
        Commands::Submit { upload_id, file } => {
            let target = match (upload_id, file) {
                (Some(upload_id), _) => SubmitTarget::Upload(upload_id),
                (None, Some(path)) => SubmitTarget::File {
                    filename: file_name(&path),
                    bytes: read_file(&path).await?,
                },
                (None, None) => anyhow::bail!("Provide --upload-id or --file"),
            };
            let result = client.submit(target).await?;
            print_validation(format, &result)?;
            return Ok(ExitCode::from(validation_exit_code(&result)));
        }
        Commands::Direct { file, dry_run } => {
            let source = ValidationSource::Multipart {
                filename: file_name(&file),
                bytes: read_file(&file).await?,
            };
            let options = ValidationOptions {
                dry_run: Some(dry_run),
                ..ValidationOptions::default()
            };
            let result = client.validate(source, Operation::Validar, options).await?;
            print_validation(format, &result)?;
            return Ok(ExitCode::from(validation_exit_code(&result)));
        }
        Commands::Documents {
            upload_id,
            storage_key,
        } => {
            let source = match (upload_id, storage_key) {
                (Some(upload_id), _) => DocumentSource::Upload(upload_id),
                (None, Some(key)) => DocumentSource::Storage(key),
                (None, None) => anyhow::bail!("Provide --upload-id or --storage-key"),
            };
            let response = client.extract_documents(&source).await?;
            match format {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Table => print!("{}", render_documents_table(&response)),
            }
            return Ok(ExitCode::from(documents_exit_code(&response)));
        }
        Commands::FixRule {
            id,
            name,
            code,
            pattern,
            suggestions,
        } => {
            let suggestions = suggestions
                .iter()
                .map(|s| parse_suggestion(s))
                .collect::<Result<Vec<_>, _>>()?;
            let rule = FixRule::regex(id, name, code, pattern, suggestions);
            let response = client.save_fix_rule(&rule).await?;
            match format {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Table => {
                    if response.ok {
                        println!("Rule {} saved", rule.id);
                    } else {
                        println!(
                            "Rule {} not saved: {}",
                            rule.id,
                            response.detail.as_deref().unwrap_or("no reason given")
                        );
                        return Ok(ExitCode::from(2));
                    }
                }
            }
        }
        Commands::Heartbeat => {
            let cancel = CancellationToken::new();
            let mut heartbeat =
                Heartbeat::spawn(Arc::new(client), config.heartbeat_interval, cancel.clone());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = heartbeat.next_event() => {
                        let Some(event) = event else { break };
                        let now = chrono::Local::now().format("%H:%M:%S");
                        match event {
                            HeartbeatEvent::Alive { ui_version } => println!(
                                "[{}] Backend alive (ui {})",
                                now,
                                ui_version.as_deref().unwrap_or("?")
                            ),
                            HeartbeatEvent::Unreachable { error } => {
                                println!("[{}] Backend unreachable: {}", now, error)
                            }
                            HeartbeatEvent::BackendRestarted { ui_version } => println!(
                                "[{}] Backend restarted (ui {}); reload any open session",
                                now,
                                ui_version.as_deref().unwrap_or("?")
                            ),
                        }
                    }
                }
            }
            cancel.cancel();
            heartbeat.join().await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<ClientError>() {
                Some(client_err) => {
                    match client_err.log_level() {
                        LogLevel::Error => tracing::error!(
                            code = client_err.error_code(),
                            error = %client_err,
                            "Command failed"
                        ),
                        LogLevel::Warn => tracing::warn!(
                            code = client_err.error_code(),
                            error = %client_err,
                            "Command failed"
                        ),
                        LogLevel::Debug => tracing::debug!(
                            code = client_err.error_code(),
                            error = %client_err,
                            "Command failed"
                        ),
                    }
                    eprintln!("Error: {}", client_err.user_message());
                    if let Some(action) = client_err.suggested_action() {
                        eprintln!("Hint: {}", action);
                    }
                }
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
