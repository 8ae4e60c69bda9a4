use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant as TokioInstant};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::BotConfig;
use crate::notify::{NotificationGate, NotificationPayload};
use crate::store::{PackageStore, RequoteStatus};

use super::{LogParser, PackageOutcomeStatus, ProgressEvent, RunSummary};

/// Environment flag telling the bot to run without prompting.
const NONINTERACTIVE_ENV: &str = "FARETRACK_BOT_NONINTERACTIVE";

/// Owns the lifecycle of one external requote bot process per invocation.
///
/// Stdout is consumed line-buffered and fed through [`LogParser`]; parsed
/// events go to the caller's channel and update package rows as they arrive.
/// A hard wall-clock timeout kills the child. Event sends never block the
/// reader: a slow or disconnected subscriber just misses frames.
pub struct RequoteSupervisor {
    config: BotConfig,
    store: Arc<dyn PackageStore>,
    gate: Option<Arc<NotificationGate>>,
    audit: AuditHandle,
}

impl RequoteSupervisor {
    pub fn new(
        config: BotConfig,
        store: Arc<dyn PackageStore>,
        gate: Option<Arc<NotificationGate>>,
        audit: AuditHandle,
    ) -> Self {
        Self {
            config,
            store,
            gate,
            audit,
        }
    }

    /// Run one supervised bot invocation to completion.
    ///
    /// The returned summary reflects everything parsed before exit, timeout
    /// or cancellation. The last event sent on `events` is always terminal
    /// (`Complete` or `Error`).
    pub async fn run(
        &self,
        events: mpsc::Sender<ProgressEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let pending_count = match self.store.pending_requotes() {
            Ok(packages) => packages.len() as u32,
            Err(e) => {
                tracing::warn!("Failed to count pending requotes: {}", e);
                0
            }
        };

        self.audit
            .emit(AuditEvent::RequoteRunStarted {
                run_id: run_id.clone(),
                pending_count,
            })
            .await;

        tracing::info!(
            run_id = %run_id,
            program = %self.config.program,
            pending_count,
            "Starting requote run"
        );

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .env(NONINTERACTIVE_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to start requote bot: {}", e);
                tracing::error!(run_id = %run_id, "{}", message);
                self.fail(&events, &run_id, &message, started).await;
                return RunSummary::default();
            }
        };

        // Stderr is logged, never surfaced as protocol events
        if let Some(stderr) = child.stderr.take() {
            let stderr_run_id = run_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(run_id = %stderr_run_id, "bot stderr: {}", line);
                }
            });
        }

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill().await;
                self.fail(&events, &run_id, "Bot stdout not captured", started)
                    .await;
                return RunSummary::default();
            }
        };
        let mut lines = BufReader::new(stdout).lines();

        let deadline = TokioInstant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut parser = LogParser::new();

        // A closed shutdown channel means no shutdown can ever arrive
        let shutdown_requested = async move {
            let mut shutdown = shutdown;
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(shutdown_requested);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(event) = parser.feed_line(&line) {
                            self.apply_event(&event);
                            // Slow subscribers drop frames, the bot keeps going
                            let _ = events.try_send(event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(run_id = %run_id, "Error reading bot output: {}", e);
                        break;
                    }
                },
                _ = sleep_until(deadline) => {
                    let _ = child.kill().await;
                    let message = format!(
                        "Requote run timed out after {}s, bot terminated",
                        self.config.timeout_secs
                    );
                    tracing::error!(run_id = %run_id, "{}", message);
                    self.fail(&events, &run_id, &message, started).await;
                    return parser.into_summary();
                }
                _ = &mut shutdown_requested => {
                    let _ = child.kill().await;
                    tracing::info!(run_id = %run_id, "Requote run cancelled, bot terminated");
                    self.fail(&events, &run_id, "Run cancelled by shutdown", started).await;
                    return parser.into_summary();
                }
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                self.fail(
                    &events,
                    &run_id,
                    &format!("Failed to wait on bot process: {}", e),
                    started,
                )
                .await;
                return parser.into_summary();
            }
        };

        if !status.success() {
            let message = format!("Requote bot exited with code {:?}", status.code());
            tracing::error!(run_id = %run_id, "{}", message);
            self.fail(&events, &run_id, &message, started).await;
            return parser.into_summary();
        }

        let summary = parser.into_summary();

        // Manual-quote notifications go out as one sequential batch after
        // exit, so the terminal frame is notification-consistent
        if let Some(gate) = &self.gate {
            for outcome in &summary.outcomes {
                if outcome.status != PackageOutcomeStatus::NeedsManual {
                    continue;
                }
                gate.evaluate(NotificationPayload::ManualQuote {
                    package_id: outcome.package_id,
                    title: outcome
                        .title
                        .clone()
                        .unwrap_or_else(|| format!("Package {}", outcome.external_id)),
                    variance_pct: outcome.variance_pct.unwrap_or(0.0),
                })
                .await;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.audit
            .emit(AuditEvent::RequoteRunCompleted {
                run_id: run_id.clone(),
                updated: summary.auto_updated,
                no_change: summary.no_change,
                needs_manual: summary.needs_manual,
                errors: summary.errors,
                duration_ms,
            })
            .await;

        tracing::info!(
            run_id = %run_id,
            updated = summary.auto_updated,
            no_change = summary.no_change,
            needs_manual = summary.needs_manual,
            errors = summary.errors,
            duration_ms,
            "Requote run completed"
        );

        let _ = events
            .send(ProgressEvent::Complete {
                summary: summary.clone(),
            })
            .await;

        summary
    }

    /// Mirror run progress onto package rows as the bot reports it.
    fn apply_event(&self, event: &ProgressEvent) {
        let (id, status) = match event {
            ProgressEvent::PackageStart { id, .. } => (*id, RequoteStatus::Checking),
            ProgressEvent::PackageDone { id, status } => {
                let requote_status = match status {
                    PackageOutcomeStatus::NeedsManual => RequoteStatus::NeedsManual,
                    PackageOutcomeStatus::Updated | PackageOutcomeStatus::NoChange => {
                        RequoteStatus::Completed
                    }
                    // Bot errors leave the package queued for the next run
                    PackageOutcomeStatus::Error => RequoteStatus::Pending,
                };
                (*id, requote_status)
            }
            _ => return,
        };

        if let Err(e) = self.store.set_requote_status(id, status) {
            tracing::warn!(package_id = id, "Failed to update requote status: {}", e);
        }
    }

    async fn fail(
        &self,
        events: &mpsc::Sender<ProgressEvent>,
        run_id: &str,
        message: &str,
        started: Instant,
    ) {
        // A dead run must not leave its in-flight package stuck at
        // `checking`, invisible to the next run's pending scan
        match self.store.reset_checking() {
            Ok(0) => {}
            Ok(n) => tracing::info!(run_id = %run_id, count = n, "Requeued in-flight packages"),
            Err(e) => tracing::warn!(run_id = %run_id, "Failed to requeue in-flight packages: {}", e),
        }

        self.audit
            .emit(AuditEvent::RequoteRunFailed {
                run_id: run_id.to_string(),
                reason: message.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await;

        let _ = events
            .send(ProgressEvent::Error {
                message: message.to_string(),
            })
            .await;
    }
}
