//! Identity store with optional JSON snapshot persistence
//!
//! Directory layout when persistence is enabled:
//! ```text
//! ~/.context-server/
//! ├── profiles/<id>.json
//! ├── personas/<id>.json
//! └── sessions/<id>.json
//! ```
//!
//! Ids come from cookies and query strings, so file names use a reversible
//! escape (see `file_stem`). Snapshot writes go through a single writer task
//! in the order the in-memory state changed.

use crate::error::Result;
use crate::identity::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Capability interface over profile, persona and session storage.
///
/// Missing records are reported as `Ok(None)`; `Err` is reserved for the
/// store itself failing.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load a visitor profile by id
    async fn load_profile(&self, id: &str) -> Result<Option<Identity>>;

    /// Insert or replace a visitor profile
    async fn save_profile(&self, profile: &Identity) -> Result<()>;

    /// Load a persona and every session recorded for it
    async fn load_persona_with_sessions(&self, id: &str) -> Result<Option<PersonaWithSessions>>;

    /// Insert or replace a persona
    async fn save_persona(&self, persona: &Identity) -> Result<()>;

    /// Load a session, stamping it as seen at `timestamp`
    async fn load_session(&self, id: &str, timestamp: DateTime<Utc>) -> Result<Option<Session>>;

    /// Look a session up without touching it
    async fn find_session(&self, id: &str) -> Result<Option<Session>>;

    /// Insert or replace a session
    async fn save_session(&self, session: &Session) -> Result<()>;

    /// Insert a session unless one with the same id exists; true if inserted
    async fn create_session_if_absent(&self, session: &Session) -> Result<bool>;
}

// =============================================================================
// Snapshot writer
// =============================================================================

enum SnapshotOp {
    Write { path: PathBuf, json: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to the task that owns all snapshot file writes
#[derive(Clone)]
struct SnapshotWriter {
    dir: PathBuf,
    tx: mpsc::UnboundedSender<SnapshotOp>,
}

impl SnapshotWriter {
    fn spawn(dir: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    SnapshotOp::Write { path, json } => {
                        if let Err(e) = tokio::fs::write(&path, json).await {
                            tracing::warn!("Failed to persist {}: {}", path.display(), e);
                        }
                    }
                    SnapshotOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { dir, tx }
    }

    /// Queue `<dir>/<kind>/<file_stem(id)>.json`; call while holding the
    /// write lock of the mutated map so queue order matches state order
    fn queue<T: serde::Serialize>(&self, kind: &str, id: &str, item: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(item)?;
        let path = self.dir.join(kind).join(format!("{}.json", file_stem(id)));
        if self.tx.send(SnapshotOp::Write { path, json }).is_err() {
            tracing::warn!(kind, id, "Snapshot writer stopped, record not persisted");
        }
        Ok(())
    }

    async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(SnapshotOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-memory identity store, optionally mirrored to JSON files
pub struct MemoryIdentityStore {
    writer: Option<SnapshotWriter>,
    profiles: Arc<RwLock<HashMap<String, Identity>>>,
    personas: Arc<RwLock<HashMap<String, Identity>>>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            writer: None,
            profiles: Arc::new(RwLock::new(HashMap::new())),
            personas: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a store mirrored under `base_dir`, loading existing snapshots
    pub async fn with_snapshots(base_dir: PathBuf) -> std::io::Result<Self> {
        for kind in ["profiles", "personas", "sessions"] {
            tokio::fs::create_dir_all(base_dir.join(kind)).await?;
        }

        let profiles = index_by(load_json_files::<Identity>(&base_dir.join("profiles")), |i| {
            i.id.clone()
        });
        let personas = index_by(load_json_files::<Identity>(&base_dir.join("personas")), |i| {
            i.id.clone()
        });
        let sessions = index_by(load_json_files::<Session>(&base_dir.join("sessions")), |s| {
            s.id.clone()
        });

        tracing::info!(
            profiles = profiles.len(),
            personas = personas.len(),
            sessions = sessions.len(),
            dir = %base_dir.display(),
            "Loaded identity snapshots"
        );

        Ok(Self {
            writer: Some(SnapshotWriter::spawn(base_dir)),
            profiles: Arc::new(RwLock::new(profiles)),
            personas: Arc::new(RwLock::new(personas)),
            sessions: Arc::new(RwLock::new(sessions)),
        })
    }

    /// Number of stored profiles
    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Number of stored sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Wait until every snapshot write queued so far has hit the disk
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    fn persist<T: serde::Serialize>(&self, kind: &str, id: &str, item: &T) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.queue(kind, id, item),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load_profile(&self, id: &str) -> Result<Option<Identity>> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn save_profile(&self, profile: &Identity) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.id.clone(), profile.clone());
        self.persist("profiles", &profile.id, profile)
    }

    async fn load_persona_with_sessions(&self, id: &str) -> Result<Option<PersonaWithSessions>> {
        let Some(persona) = self.personas.read().await.get(id).cloned() else {
            return Ok(None);
        };

        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.identity_id == id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.last_seen);

        Ok(Some(PersonaWithSessions { persona, sessions }))
    }

    async fn save_persona(&self, persona: &Identity) -> Result<()> {
        let mut personas = self.personas.write().await;
        personas.insert(persona.id.clone(), persona.clone());
        self.persist("personas", &persona.id, persona)
    }

    async fn load_session(&self, id: &str, timestamp: DateTime<Utc>) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Ok(None);
        };
        session.touch(timestamp);
        let touched = session.clone();
        self.persist("sessions", &touched.id, &touched)?;
        Ok(Some(touched))
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        self.persist("sessions", &session.id, session)
    }

    async fn create_session_if_absent(&self, session: &Session) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Ok(false);
        }
        sessions.insert(session.id.clone(), session.clone());
        self.persist("sessions", &session.id, session)?;
        Ok(true)
    }
}

fn index_by<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> HashMap<String, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

/// One-to-one file stem for an id: ASCII alphanumerics and `-` pass through,
/// every other byte becomes `_XX` (uppercase hex)
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

/// Load all JSON files from a directory into a Vec
fn load_json_files<T: serde::de::DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut items = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
            }
            return items;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Failed to parse {}: {}", path.display(), e),
            },
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }
    }

    items
}
