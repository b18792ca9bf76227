//! fai-capture: guided first-article-inspection photo capture.
//!
//! Walks an operator through a fixed, configurable sequence of photographs
//! of a rack assembly. Every step is mirrored to disk (a JSON session
//! descriptor plus a SQLite photo database) so a crash or restart resumes
//! exactly where the operator left off.

#![warn(clippy::all)]

mod capture;
mod cli;
mod config;
mod export;
mod resume;
pub mod retry;
mod sequence;
mod session;
mod shell;
mod shutdown;
mod state;
mod types;

use std::io::{IsTerminal, Write};

use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use resume::{ResumeCheck, ResumeCoordinator, ResumeOffer};
use session::{Session, SessionError};

/// Ask a yes/no question on stdin. Non-interactive stdin answers `default`.
fn confirm(question: &str, default: bool) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(default);
    }
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", question, hint);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    if answer.is_empty() {
        return Ok(default);
    }
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn print_offer(offer: &ResumeOffer) {
    println!("Saved session found:");
    println!("  Mode:     {}", offer.mode.display_name());
    if let Some(pn) = &offer.part_identifier {
        println!("  PN:       {}", pn);
    }
    if let Some(sn) = &offer.unit_identifier {
        println!("  SN:       {}", sn);
    }
    println!("  Photos:   {} captured", offer.photo_count);
    if offer.complete {
        println!("  Position: review");
    } else {
        println!("  Position: photo {} of {}", offer.cursor + 1, offer.queue_len);
    }
    println!(
        "  Saved:    {}",
        offer.saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
}

/// Run the plan command.
fn run_plan(args: cli::SessionArgs) -> anyhow::Result<()> {
    let Some(setup) = args.setup(Local::now().date_naive()) else {
        anyhow::bail!("--mode is required");
    };
    let queue = sequence::generate(setup.mode, &setup.quantities, setup.packout, &setup.naming);
    if queue.is_empty() {
        println!("{}", SessionError::NothingToCapture);
        return Ok(());
    }

    println!("{}: {} photos", setup.mode.display_name(), queue.len());
    println!();
    for (i, spec) in queue.iter().enumerate() {
        println!(
            "{:>3}. {:<10} {:<45} {:<9} {}",
            i + 1,
            spec.id,
            spec.display_name,
            spec.orientation.as_str(),
            spec.filename
        );
    }
    Ok(())
}

/// Run the status command.
async fn run_status(config: &Config) -> anyhow::Result<()> {
    if !config.has_saved_state() {
        println!("No saved session in {}", config.data_dir.display());
        return Ok(());
    }

    let stores = config.open_stores().await?;
    let Some(descriptor) = stores.metadata.load().await? else {
        println!("No saved session in {}", config.data_dir.display());
        return Ok(());
    };
    let Some(mode) = descriptor.mode else {
        println!("Saved session has no mode; it will be discarded on the next run.");
        return Ok(());
    };
    let photo_count = stores.payloads.count().await?;

    print_offer(&ResumeOffer {
        mode,
        part_identifier: descriptor.part_identifier.clone(),
        unit_identifier: descriptor.unit_identifier.clone(),
        photo_count,
        cursor: descriptor.cursor,
        queue_len: descriptor.queue.len(),
        complete: descriptor.complete,
        saved_at: descriptor.saved_at,
    });
    Ok(())
}

/// Resume, or start a new session from `args`. `None` means there is
/// nothing to run.
async fn open_session(
    config: &Config,
    stores: &state::Stores,
    args: &cli::RunArgs,
) -> anyhow::Result<Option<Session>> {
    let coordinator = ResumeCoordinator::new(stores.clone());

    if let ResumeCheck::Offer(offer) = coordinator.inspect().await? {
        let resume = if args.resume {
            true
        } else if args.fresh {
            false
        } else {
            print_offer(&offer);
            confirm("Resume this session?", true)?
        };

        if resume {
            if let Some(resumed) = coordinator.resume().await? {
                for failure in &resumed.failures {
                    println!(
                        "Could not restore photo {}: {}. Retake it from the review list.",
                        failure.id, failure.reason
                    );
                }
                for id in &resumed.rejected {
                    println!("Discarded photo {} (not part of this session).", id);
                }
                return Ok(Some(resumed.session));
            }
            println!("Saved session could not be read; starting fresh.");
        } else {
            coordinator.decline().await?;
        }
    }

    let Some(setup) = args.session.setup(Local::now().date_naive()) else {
        println!(
            "No session to resume. Start one with `fai-capture run --mode <inspection|packout>`."
        );
        return Ok(None);
    };

    let mut session = Session::new();
    match session.start(setup) {
        Ok(count) => {
            println!("Starting {} with {} photos.", session.mode().map_or("", |m| m.display_name()), count);
            tracing::debug!(data_dir = %config.data_dir.display(), "New session");
            Ok(Some(session))
        }
        Err(e) => {
            println!("{}", e);
            Ok(None)
        }
    }
}

/// Run the interactive capture command.
async fn run_capture(config: &Config, args: cli::RunArgs) -> anyhow::Result<()> {
    let stores = config.open_stores().await?;
    let Some(session) = open_session(config, &stores, &args).await? else {
        return Ok(());
    };

    let (persistence, writer) = state::spawn_writer(stores, config.retry.clone());
    let shutdown_token = shutdown::install_signal_handler();

    let mut shell = shell::Shell::new(session, persistence.clone());
    let result = shell::run_interactive(&mut shell, &shutdown_token).await;

    // Whatever happened in the loop, get the last changes to disk.
    shell.forward_intents();
    tracing::info!(
        captured = shell.session().captured().len(),
        cursor = shell.session().cursor(),
        "Capture loop ended"
    );
    drop(shell);
    match persistence.flush().await {
        Ok(report) if !report.is_clean() => {
            println!(
                "Warning: {} change(s) could not be saved; the most recent work may be lost on restart.",
                report.failed.len()
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Final flush failed"),
    }
    drop(persistence);
    let stats = writer.await?;
    tracing::debug!(applied = stats.applied, failed = stats.failed, "Writer finished");

    result
}

/// Run the export command.
async fn run_export(config: &Config, args: cli::ExportArgs) -> anyhow::Result<()> {
    if !config.has_saved_state() {
        println!("No saved session in {}", config.data_dir.display());
        return Ok(());
    }

    let stores = config.open_stores().await?;
    let Some(descriptor) = stores.metadata.load().await? else {
        println!("No saved session to export.");
        return Ok(());
    };
    let loaded = stores.payloads.load_all().await?;
    for failure in &loaded.failures {
        println!("Skipping unreadable photo {}: {}", failure.id, failure.reason);
    }

    let Some((session, rejected)) = Session::restore(descriptor, loaded.photos) else {
        println!("No saved session to export.");
        return Ok(());
    };
    for record in &rejected {
        println!("Skipping photo {} (not part of this session).", record.id());
    }
    let (Some(setup), Some(mode)) = (session.setup(), session.mode()) else {
        return Ok(());
    };

    let stem = setup.naming.archive_stem(mode);
    let report = export::export_photos(session.captured(), &stem, &args.out).await?;
    println!(
        "Exported {} photos to {}",
        report.written.len(),
        report.dir.display()
    );

    let missing = session.missing();
    if !missing.is_empty() {
        println!("Not captured:");
        for spec in missing {
            println!("  {:<10} {}", spec.id, spec.display_name);
        }
    }
    Ok(())
}

/// Run the reset command.
async fn run_reset(config: &Config, args: cli::ResetArgs) -> anyhow::Result<()> {
    if !config.has_saved_state() {
        println!("No saved session in {}", config.data_dir.display());
        return Ok(());
    }

    if !args.yes {
        println!("This will delete the saved session and all captured photos in:");
        println!("  {}", config.data_dir.display());
        println!();
        if !confirm("Are you sure?", false)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let stores = config.open_stores().await?;
    stores.clear_all().await?;
    println!("Saved session deleted.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(&cli);
    tracing::debug!(?config, "Starting fai-capture");

    match cli.command {
        Command::Plan(args) => run_plan(args),
        Command::Status => run_status(&config).await,
        Command::Run(args) => run_capture(&config, args).await,
        Command::Export(args) => run_export(&config, args).await,
        Command::Reset(args) => run_reset(&config, args).await,
    }
}
