//! Line-oriented operator loop over a live session.
//!
//! Each command mutates the session, then the session's persistence intents
//! are handed to the writer without waiting for them to land.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureError, CaptureSource, FileCaptureSource};
use crate::session::{CaptureOutcome, Session};
use crate::state::PersistenceHandle;

pub const HELP: &str = "\
Commands:
  capture <file>     capture the current photo from an image file
  skip               move on without capturing
  back               go back one photo
  retake <n>         re-shoot captured photo n (see `list`)
  cancel             abandon the retake in progress
  delete <n>...      delete captured photos
  list               list captured photos
  missing            list photos passed without a capture
  done               finish and show the review summary
  quit               leave; the session stays saved for resume
  new                discard this session and all of its photos
  help               show this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Capture(Option<PathBuf>),
    Skip,
    Back,
    /// 1-based captured index as shown by `list`.
    Retake(usize),
    Cancel,
    Delete(Vec<usize>),
    List,
    Missing,
    Done,
    Quit,
    /// Discard the session so the next run starts fresh.
    New,
    Help,
}

/// Parse one input line. Empty lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "capture" | "c" => ShellCommand::Capture(if rest.is_empty() {
            None
        } else {
            Some(PathBuf::from(rest.join(" ")))
        }),
        "skip" | "s" => ShellCommand::Skip,
        "back" | "b" => ShellCommand::Back,
        "retake" | "r" => match rest.as_slice() {
            [n] => ShellCommand::Retake(parse_index(n)?),
            _ => return Err("usage: retake <n>".to_string()),
        },
        "cancel" => ShellCommand::Cancel,
        "delete" | "d" => {
            if rest.is_empty() {
                return Err("usage: delete <n>...".to_string());
            }
            ShellCommand::Delete(
                rest.iter()
                    .map(|n| parse_index(n))
                    .collect::<Result<_, _>>()?,
            )
        }
        "list" | "l" => ShellCommand::List,
        "missing" | "m" => ShellCommand::Missing,
        "done" => ShellCommand::Done,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        "new" => ShellCommand::New,
        "help" | "h" | "?" => ShellCommand::Help,
        other => return Err(format!("unknown command '{}' (try `help`)", other)),
    };
    Ok(Some(command))
}

fn parse_index(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a photo number", s)),
    }
}

/// Operator numbers are 1-based; 0 maps to an index that never exists.
fn to_index(n: usize) -> usize {
    n.checked_sub(1).unwrap_or(usize::MAX)
}

const RETAKE_PENDING: &str = "Finish the retake with `capture <file>`, or `cancel` it first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    session: Session,
    persistence: PersistenceHandle,
}

impl Shell {
    pub fn new(session: Session, persistence: PersistenceHandle) -> Self {
        Self {
            session,
            persistence,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Forward pending intents to the writer. A stopped writer is logged;
    /// the in-memory session keeps going regardless.
    pub fn forward_intents(&mut self) {
        let intents = self.session.take_intents();
        if intents.is_empty() {
            return;
        }
        if let Err(e) = self.persistence.submit_all(intents) {
            tracing::error!(error = %e, "Session changes were not saved");
        }
    }

    /// Run one command against the session, writing operator output to `out`.
    pub async fn execute(
        &mut self,
        command: ShellCommand,
        out: &mut dyn Write,
    ) -> std::io::Result<Flow> {
        let flow = match command {
            ShellCommand::Capture(path) => {
                self.capture(&FileCaptureSource::new(path), out).await?;
                Flow::Continue
            }
            ShellCommand::Skip => {
                if self.session.is_retaking() {
                    writeln!(out, "{}", RETAKE_PENDING)?;
                } else if !self.session.skip() {
                    self.report_end(out)?;
                }
                Flow::Continue
            }
            ShellCommand::Back => {
                if self.session.is_retaking() {
                    writeln!(out, "{}", RETAKE_PENDING)?;
                } else if !self.session.back() {
                    writeln!(out, "Already at the first photo.")?;
                }
                Flow::Continue
            }
            ShellCommand::Retake(n) => {
                match self.session.enter_retake(to_index(n)) {
                    Ok(spec) => writeln!(out, "Retaking {} ({}).", spec.id, spec.display_name)?,
                    Err(e) => writeln!(out, "{}", e)?,
                }
                Flow::Continue
            }
            ShellCommand::Cancel => {
                if !self.session.cancel_retake() {
                    writeln!(out, "No retake in progress.")?;
                }
                Flow::Continue
            }
            ShellCommand::Delete(numbers) => {
                let indices: Vec<usize> = numbers.iter().copied().map(to_index).collect();
                match self.session.delete_selected(&indices) {
                    Ok(removed) => {
                        for photo in &removed {
                            writeln!(out, "Deleted {}.", photo.filename())?;
                        }
                    }
                    Err(e) => writeln!(out, "{}", e)?,
                }
                Flow::Continue
            }
            ShellCommand::List => {
                self.list(out)?;
                Flow::Continue
            }
            ShellCommand::Missing => {
                self.missing(out)?;
                Flow::Continue
            }
            ShellCommand::Done => {
                self.summary(out)?;
                Flow::Exit
            }
            ShellCommand::Quit => {
                writeln!(out, "Session saved. Run again to resume.")?;
                Flow::Exit
            }
            ShellCommand::New => {
                self.session.reset();
                writeln!(
                    out,
                    "Session cleared. Start a new one with `fai-capture run --mode <inspection|packout>`."
                )?;
                Flow::Exit
            }
            ShellCommand::Help => {
                writeln!(out, "{}", HELP)?;
                Flow::Continue
            }
        };
        self.forward_intents();
        Ok(flow)
    }

    async fn capture(
        &mut self,
        source: &dyn CaptureSource,
        out: &mut dyn Write,
    ) -> std::io::Result<()> {
        let payload = match source.capture_current_frame().await {
            Ok(p) => p,
            Err(CaptureError::NotActive) => {
                writeln!(out, "No capture source: give an image file, e.g. `capture shot.jpg`.")?;
                return Ok(());
            }
            Err(e) => {
                writeln!(out, "Capture failed: {}", e)?;
                return Ok(());
            }
        };

        match self.session.capture_current(payload) {
            Ok(outcome) => {
                let photo = &self.session.captured()[outcome.index()];
                match outcome {
                    CaptureOutcome::Retaken { .. } => {
                        writeln!(out, "Retook {}.", photo.filename())?
                    }
                    CaptureOutcome::Replaced { .. } => {
                        writeln!(out, "Replaced {}.", photo.filename())?
                    }
                    CaptureOutcome::Appended { .. } => {
                        writeln!(out, "Saved {}.", photo.filename())?
                    }
                }
                if outcome.should_advance() && !self.session.advance() {
                    self.report_end(out)?;
                }
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
        Ok(())
    }

    fn report_end(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "End of the list: {} of {} captured. Review with `list` and `missing`, then `done`.",
            self.session.captured().len(),
            self.session.queue().len()
        )
    }

    /// Describe the photo to capture next.
    pub fn prompt(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if !self.session.is_active() {
            return writeln!(out, "No active session.");
        }
        let Some(spec) = self.session.current() else {
            return writeln!(out, "Nothing to capture.");
        };
        if self.session.is_retaking() {
            writeln!(out, "[retake] {} {} ({})", spec.id, spec.display_name, spec.orientation.as_str())?;
            return Ok(());
        }
        if self.session.is_complete() {
            return writeln!(out, "[review] {} captured", self.session.captured().len());
        }
        let progress = self.session.progress();
        let template = spec
            .template
            .as_deref()
            .map(|t| format!(", template {}", t))
            .unwrap_or_default();
        writeln!(
            out,
            "[{}/{} {}%] {} {} ({}{})",
            progress.current,
            progress.total,
            progress.percentage,
            spec.id,
            spec.display_name,
            spec.orientation.as_str(),
            template
        )
    }

    fn list(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.session.captured().is_empty() {
            return writeln!(out, "No photos captured yet.");
        }
        for (i, photo) in self.session.captured().iter().enumerate() {
            writeln!(
                out,
                "{:>3}. {:<10} {:<45} {}",
                i + 1,
                photo.id(),
                photo.spec.display_name,
                photo.captured_at.format("%H:%M:%S")
            )?;
        }
        Ok(())
    }

    fn missing(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let missing = self.session.missing();
        if missing.is_empty() {
            return writeln!(out, "Nothing missing so far.");
        }
        for spec in missing {
            writeln!(out, "  {:<10} {}", spec.id, spec.display_name)?;
        }
        Ok(())
    }

    fn summary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let captured = self.session.captured().len();
        let total = self.session.queue().len();
        writeln!(out, "{} of {} photos captured.", captured, total)?;
        let missing = self.session.missing();
        if !missing.is_empty() {
            writeln!(out, "Missing:")?;
            for spec in missing {
                writeln!(out, "  {:<10} {}", spec.id, spec.display_name)?;
            }
        }
        writeln!(out, "Run `fai-capture export --out <dir>` to collect the photos.")
    }
}

/// Input lines as read by [`spawn_stdin_reader`].
pub type LineReceiver = mpsc::UnboundedReceiver<std::io::Result<String>>;

/// Read stdin on a plain OS thread and hand each line over a channel.
///
/// The thread is never joined: it may sit in a blocking read forever, and the
/// process exits without waiting for it. The channel closes at end of input.
pub fn spawn_stdin_reader() -> std::io::Result<LineReceiver> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Read commands from stdin until `done`/`quit`, end of input, or shutdown.
pub async fn run_interactive(shell: &mut Shell, shutdown: &CancellationToken) -> anyhow::Result<()> {
    let mut lines = spawn_stdin_reader()?;
    let mut stdout = std::io::stdout();
    run_lines(shell, &mut lines, shutdown, &mut stdout).await
}

/// Execute lines from `lines` until a command exits, the channel closes, or
/// `shutdown` is cancelled. Cancellation wins over input already queued.
pub async fn run_lines(
    shell: &mut Shell,
    lines: &mut LineReceiver,
    shutdown: &CancellationToken,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    shell.forward_intents();
    writeln!(out, "Type `help` for commands.")?;

    loop {
        shell.prompt(out)?;
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("Shutdown requested; leaving the command loop");
                break;
            }
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line?) {
            Ok(Some(command)) => {
                if shell.execute(command, out).await? == Flow::Exit {
                    break;
                }
            }
            Ok(None) => {}
            Err(msg) => writeln!(out, "{}", msg)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::sequence::Naming;
    use crate::session::types::{ComponentQuantities, PackoutOptions};
    use crate::session::SessionSetup;
    use crate::state::db::PayloadStore;
    use crate::state::{spawn_writer, JsonFileMetadataStore, SqlitePayloadStore, Stores};
    use crate::types::Mode;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("fai-capture")
            .join("shell_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn shell(name: &str) -> (Shell, Arc<SqlitePayloadStore>, PathBuf) {
        let dir = test_dir(name);
        let payloads = Arc::new(SqlitePayloadStore::open_in_memory().unwrap());
        let metadata = Arc::new(JsonFileMetadataStore::new(dir.join("session.json")));
        let (handle, _task) = spawn_writer(
            Stores::new(metadata, payloads.clone()),
            RetryConfig::immediate(0),
        );
        let mut session = Session::new();
        session
            .start(SessionSetup {
                mode: Mode::Packout,
                naming: Naming::new(Some("PN"), Some("SN"), NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()),
                quantities: ComponentQuantities::new(),
                packout: PackoutOptions::default(),
            })
            .unwrap();
        let image = dir.join("shot.jpg");
        std::fs::write(&image, b"jpeg").unwrap();
        (Shell::new(session, handle), payloads, image)
    }

    async fn run(shell: &mut Shell, line: &str) -> (Flow, String) {
        let mut out = Vec::new();
        let command = parse_command(line).unwrap().unwrap();
        let flow = shell.execute(command, &mut out).await.unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(
            parse_command("capture /tmp/a b.jpg").unwrap(),
            Some(ShellCommand::Capture(Some(PathBuf::from("/tmp/a b.jpg"))))
        );
        assert_eq!(parse_command("capture").unwrap(), Some(ShellCommand::Capture(None)));
        assert_eq!(parse_command("RETAKE 2").unwrap(), Some(ShellCommand::Retake(2)));
        assert_eq!(
            parse_command("delete 3 1").unwrap(),
            Some(ShellCommand::Delete(vec![3, 1]))
        );
        assert_eq!(parse_command("q").unwrap(), Some(ShellCommand::Quit));
        assert_eq!(parse_command("new").unwrap(), Some(ShellCommand::New));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("retake").is_err());
        assert!(parse_command("retake 0").is_err());
        assert!(parse_command("delete x").is_err());
        assert!(parse_command("delete").is_err());
        assert!(parse_command("zoom").is_err());
    }

    #[tokio::test]
    async fn test_capture_without_file_leaves_session_untouched() {
        let (mut shell, _, _) = shell("no_source").await;
        let (flow, out) = run(&mut shell, "capture").await;
        assert_eq!(flow, Flow::Continue);
        assert!(out.contains("No capture source"));
        assert!(shell.session().captured().is_empty());
        assert_eq!(shell.session().cursor(), 0);
    }

    #[tokio::test]
    async fn test_capture_advances_and_persists() {
        let (mut shell, payloads, image) = shell("capture").await;
        let (_, out) = run(&mut shell, &format!("capture {}", image.display())).await;
        assert!(out.contains("Saved PN_SN_PK_FR1.jpg"));
        assert_eq!(shell.session().cursor(), 1);

        shell.persistence.flush().await.unwrap();
        assert_eq!(payloads.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retake_flow_restores_cursor() {
        let (mut shell, _, image) = shell("retake").await;
        let capture = format!("capture {}", image.display());
        run(&mut shell, &capture).await;
        run(&mut shell, &capture).await;
        run(&mut shell, "skip").await;
        assert_eq!(shell.session().cursor(), 3);

        let (_, out) = run(&mut shell, "retake 1").await;
        assert!(out.contains("PK_FR1"));
        assert_eq!(shell.session().cursor(), 0);

        let (_, out) = run(&mut shell, &capture).await;
        assert!(out.contains("Retook"));
        assert_eq!(shell.session().cursor(), 3);
        assert_eq!(shell.session().captured().len(), 2);
    }

    #[tokio::test]
    async fn test_nested_retake_reported() {
        let (mut shell, _, image) = shell("nested").await;
        run(&mut shell, &format!("capture {}", image.display())).await;
        run(&mut shell, "retake 1").await;
        let (_, out) = run(&mut shell, "retake 1").await;
        assert!(out.contains("already in progress"));
        let (_, out) = run(&mut shell, "cancel").await;
        assert!(out.is_empty());
        assert!(!shell.session().is_retaking());
    }

    #[tokio::test]
    async fn test_delete_and_missing() {
        let (mut shell, payloads, image) = shell("delete").await;
        let capture = format!("capture {}", image.display());
        for _ in 0..3 {
            run(&mut shell, &capture).await;
        }
        let (_, out) = run(&mut shell, "delete 2").await;
        assert!(out.contains("PN_SN_PK_RR1.jpg"));
        let (_, out) = run(&mut shell, "missing").await;
        assert!(out.contains("PK_RR1"));

        shell.persistence.flush().await.unwrap();
        assert_eq!(payloads.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_done_exits_with_summary() {
        let (mut shell, _, _) = shell("done").await;
        let (flow, out) = run(&mut shell, "done").await;
        assert_eq!(flow, Flow::Exit);
        assert!(out.contains("0 of 11 photos captured"));
    }

    #[tokio::test]
    async fn test_skip_and_back_during_retake_are_refused() {
        let (mut shell, _, image) = shell("retake_skip").await;
        let capture = format!("capture {}", image.display());
        run(&mut shell, &capture).await;
        run(&mut shell, &capture).await;
        run(&mut shell, "retake 1").await;

        let (flow, out) = run(&mut shell, "skip").await;
        assert_eq!(flow, Flow::Continue);
        assert!(out.contains("`cancel` it first"));
        assert!(!out.contains("End of the list"));

        let (_, out) = run(&mut shell, "back").await;
        assert!(out.contains("`cancel` it first"));
        assert!(!out.contains("first photo"));

        assert!(shell.session().is_retaking());
        assert!(!shell.session().is_complete());
        assert_eq!(shell.session().cursor(), 0);

        run(&mut shell, "cancel").await;
        assert_eq!(shell.session().cursor(), 2);
    }

    #[tokio::test]
    async fn test_new_clears_saved_session() {
        let (mut shell, payloads, image) = shell("new").await;
        let capture = format!("capture {}", image.display());
        run(&mut shell, &capture).await;
        run(&mut shell, &capture).await;

        let (flow, out) = run(&mut shell, "new").await;
        assert_eq!(flow, Flow::Exit);
        assert!(out.contains("Session cleared"));
        assert!(!shell.session().is_active());
        assert!(shell.session().queue().is_empty());

        shell.persistence.flush().await.unwrap();
        assert_eq!(payloads.count().await.unwrap(), 0);
        assert!(!image.with_file_name("session.json").exists());

        let mut prompt = Vec::new();
        shell.prompt(&mut prompt).unwrap();
        assert_eq!(String::from_utf8(prompt).unwrap(), "No active session.\n");
    }

    #[tokio::test]
    async fn test_loop_executes_lines_until_quit() {
        let (mut shell, _, image) = shell("loop_quit").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        for line in [
            format!("capture {}", image.display()),
            String::new(),
            "zoom".to_string(),
            "quit".to_string(),
            "skip".to_string(),
        ] {
            tx.send(Ok(line)).unwrap();
        }

        let mut out = Vec::new();
        run_lines(&mut shell, &mut rx, &CancellationToken::new(), &mut out)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Saved PN_SN_PK_FR1.jpg"));
        assert!(out.contains("unknown command 'zoom'"));
        assert!(out.contains("Session saved"));
        assert_eq!(shell.session().cursor(), 1);
        // Nothing after `quit` is consumed.
        assert_eq!(rx.try_recv().unwrap().unwrap(), "skip");
    }

    #[tokio::test]
    async fn test_loop_returns_on_shutdown_while_waiting_for_input() {
        let (mut shell, _, _) = shell("loop_shutdown").await;
        // The sender stays alive: input is still open, as with a terminal.
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut out = Vec::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_lines(&mut shell, &mut rx, &shutdown, &mut out),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_loop_prefers_shutdown_over_queued_input() {
        let (mut shell, _, image) = shell("loop_cancelled").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Ok(format!("capture {}", image.display()))).unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut out = Vec::new();
        run_lines(&mut shell, &mut rx, &shutdown, &mut out).await.unwrap();
        assert!(shell.session().captured().is_empty());
    }

    #[tokio::test]
    async fn test_loop_ends_at_end_of_input_and_surfaces_read_errors() {
        let (mut shell, _, _) = shell("loop_eof").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Ok("skip".to_string())).unwrap();
        drop(tx);
        let mut out = Vec::new();
        run_lines(&mut shell, &mut rx, &CancellationToken::new(), &mut out)
            .await
            .unwrap();
        assert_eq!(shell.session().cursor(), 1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Err(std::io::Error::other("tty gone"))).unwrap();
        let result = run_lines(&mut shell, &mut rx, &CancellationToken::new(), &mut out).await;
        assert!(result.is_err());
    }
}
