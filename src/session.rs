//! Per-sender session state: current working directory, plus the `session`
//! and `cd` subcommands the agent handles locally (spec §4.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

/// A synthesized `(stdout, stderr, exit_code)` result for a locally-handled
/// session subcommand, shaped the same as a shell executor result so the
/// agent engine can treat both uniformly.
pub type SessionResult = (String, String, i32);

struct Session {
    cwd: PathBuf,
}

/// Per-sender mapping of mutable session state.
///
/// Guarded by the agent's command lock in practice (spec §5), but the
/// table itself also carries its own mutex so it can be exercised directly
/// in tests without standing up the whole engine.
#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    /// Creates an empty session table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sender's current working directory, creating a session
    /// rooted at the home directory if none exists yet.
    pub async fn cwd(&self, sender_id: &str) -> PathBuf {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| Session { cwd: home_dir() })
            .cwd
            .clone()
    }

    /// Removes the sender's session, if any.
    pub async fn end(&self, sender_id: &str) {
        self.sessions.lock().await.remove(sender_id);
    }

    /// Handles `command` as a session subcommand (`session`, `session
    /// start`, `session status`, `session end`, `cd`, `cd <path>`) if it is
    /// one, returning the synthesized result. Returns `None` for any other
    /// command, which the caller should then pass to the shell executor.
    pub async fn handle(&self, sender_id: &str, command: &str) -> Option<SessionResult> {
        let normalized = command.trim();
        let lowered = normalized.to_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();

        if parts.first() == Some(&"session") {
            return Some(match parts.get(1) {
                None | Some(&"status") => {
                    let cwd = self.cwd(sender_id).await;
                    (format!("Session active\nCWD:{}", cwd.display()), String::new(), 0)
                }
                Some(&"start") => {
                    let cwd = self.cwd(sender_id).await;
                    (format!("Session started\nCWD:{}", cwd.display()), String::new(), 0)
                }
                Some(&"end") => {
                    self.end(sender_id).await;
                    ("Session ended".to_string(), String::new(), 0)
                }
                Some(_) => (
                    "Usage: session start | session status | session end".to_string(),
                    String::new(),
                    0,
                ),
            });
        }

        if parts.first() == Some(&"cd") {
            let target_arg = normalized.splitn(2, char::is_whitespace).nth(1).unwrap_or("").trim();
            return Some(self.handle_cd(sender_id, target_arg).await);
        }

        None
    }

    async fn handle_cd(&self, sender_id: &str, target_arg: &str) -> SessionResult {
        let current_cwd = self.cwd(sender_id).await;
        let target = if target_arg.is_empty() {
            home_dir()
        } else {
            resolve_path(&current_cwd, target_arg)
        };

        if !target.is_dir() {
            return (
                String::new(),
                format!("cd: no such directory: {}", target.display()),
                1,
            );
        }

        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| Session { cwd: home_dir() })
            .cwd = target.clone();

        (format!("CWD:{}", target.display()), String::new(), 0)
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

/// Expands `~`, resolves relative to `base`, and normalizes `.`/`..`
/// components without touching the filesystem (no symlink resolution).
fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = if raw == "~" {
        home_dir()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(raw)
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };

    normalize(&absolute)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            std::path::Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
