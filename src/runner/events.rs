use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::time::Duration as StdDuration;
use tokio::sync::broadcast;

use crate::utils::truncate_chars;

/// Longest error excerpt shown on a progress line
pub const PROGRESS_ERROR_CHARS: usize = 80;

/// Suite execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    SuiteStarted {
        suite: String,
        case_count: usize,
    },
    SuiteFinished {
        suite: String,
        passed: usize,
        failed: usize,
    },

    SessionEstablished {
        suite: String,
        identifier: String,
    },
    SessionFailed {
        suite: String,
        error: String,
    },

    CaseStarted {
        suite: String,
        ordinal: usize,
        name: String,
    },
    CasePassed {
        suite: String,
        ordinal: usize,
        name: String,
        duration_ms: u64,
    },
    CaseFailed {
        suite: String,
        ordinal: usize,
        name: String,
        error: String,
        duration_ms: u64,
    },
    CaseRetrying {
        suite: String,
        name: String,
        attempt: u32,
        max_attempts: u32,
    },
    CleanupFailed {
        suite: String,
        name: String,
        error: String,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting suite events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        // No subscribers is fine: nobody is watching progress
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

/// Console event listener printing one progress line per test case
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        // Spinners only make sense on a terminal
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // One running case per suite at most
        let mut spinners: HashMap<String, ProgressBar> = HashMap::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("progress output skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::SuiteStarted { suite, case_count } => {
                    multi
                        .println(format!(
                            "\n{} Suite: {} ({} test cases)",
                            "▶".green().bold(),
                            suite.cyan(),
                            case_count
                        ))
                        .ok();
                }

                TestEvent::SuiteFinished {
                    suite,
                    passed,
                    failed,
                } => {
                    if let Some(pb) = spinners.remove(&suite) {
                        pb.finish_and_clear();
                    }
                    multi
                        .println(format!(
                            "{} Suite {} finished: {} passed, {} failed",
                            "■".blue().bold(),
                            suite,
                            passed.to_string().green(),
                            failed.to_string().red()
                        ))
                        .ok();
                }

                TestEvent::SessionEstablished { identifier, .. } => {
                    multi
                        .println(format!(
                            "  {} Session established for {}",
                            "🔐".to_string().blue(),
                            identifier.cyan()
                        ))
                        .ok();
                }

                TestEvent::SessionFailed { error, .. } => {
                    multi
                        .println(format!(
                            "  {} Session could not be established: {}",
                            "⚠".yellow(),
                            truncate_chars(&error, PROGRESS_ERROR_CHARS)
                        ))
                        .ok();
                }

                TestEvent::CaseStarted {
                    suite,
                    ordinal,
                    name,
                } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("  {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    pb.set_message(format!("[{}] {}...", ordinal + 1, name.dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinners.insert(suite, pb);
                }

                TestEvent::CasePassed {
                    suite,
                    name,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = spinners.remove(&suite) {
                        pb.finish_and_clear();
                    }
                    multi
                        .println(format!(
                            "  {} {} {}",
                            "✓".green(),
                            name,
                            format!("({}ms)", duration_ms).dimmed()
                        ))
                        .ok();
                }

                TestEvent::CaseFailed {
                    suite,
                    name,
                    error,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = spinners.remove(&suite) {
                        pb.finish_and_clear();
                    }
                    multi
                        .println(format!(
                            "  {} {} - {} {}",
                            "✗".red(),
                            name,
                            truncate_chars(&error, PROGRESS_ERROR_CHARS),
                            format!("({}ms)", duration_ms).dimmed()
                        ))
                        .ok();
                }

                TestEvent::CaseRetrying {
                    suite,
                    name,
                    attempt,
                    max_attempts,
                } => {
                    if let Some(pb) = spinners.get(&suite) {
                        pb.set_message(format!(
                            "{} {}",
                            name.dimmed(),
                            format!("↻ retry {}/{}", attempt, max_attempts).yellow()
                        ));
                    }
                }

                TestEvent::CleanupFailed { name, error, .. } => {
                    multi
                        .println(format!(
                            "    {} cleanup for {} failed: {}",
                            "⚠".yellow(),
                            name,
                            truncate_chars(&error, PROGRESS_ERROR_CHARS)
                        ))
                        .ok();
                }

                TestEvent::Log { message } => {
                    multi.println(format!("    {}", message)).ok();
                }
            }
        }

        for (_, pb) in spinners.drain() {
            pb.finish_and_clear();
        }
    }
}
