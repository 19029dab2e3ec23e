use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::SessionStoreError;

/// Storage key the login flow writes the session record under.
pub const SESSION_STORAGE_KEY: &str = "user";

// --- Rights ---

/// Right
///
/// The closed set of application areas a session can be granted. The backend
/// names them in Russian; those names only exist at the serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Right {
    Students,
    Teachers,
    Contracts,
    Equipment,
    Analysis,
}

impl Right {
    /// Order in which rights are tried when picking a landing page.
    pub const PRIORITY: [Right; 5] = [
        Right::Students,
        Right::Teachers,
        Right::Contracts,
        Right::Equipment,
        Right::Analysis,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Right::Students => "Студенты",
            Right::Teachers => "Преподаватели",
            Right::Contracts => "Договора",
            Right::Equipment => "Оборудование",
            Right::Analysis => "Анализ",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|right| right.wire_name() == name.trim())
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Rights
///
/// Typed rights table. Only an explicit `true` grants a right; names outside the
/// closed set are dropped on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rights(BTreeMap<Right, bool>);

impl Rights {
    pub fn grants(&self, right: Right) -> bool {
        self.0.get(&right).copied().unwrap_or(false)
    }

    pub fn with(mut self, right: Right, granted: bool) -> Self {
        self.0.insert(right, granted);
        self
    }

    /// Granted rights in priority order.
    pub fn granted(&self) -> impl Iterator<Item = Right> + '_ {
        Right::PRIORITY.into_iter().filter(|r| self.grants(*r))
    }
}

impl FromIterator<(Right, bool)> for Rights {
    fn from_iter<I: IntoIterator<Item = (Right, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Rights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(right, granted)| (right.wire_name(), granted)))
    }
}

impl<'de> Deserialize<'de> for Rights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` reads as an empty table; any non-boolean value is malformed.
        let raw = Option::<HashMap<String, bool>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, granted)| match Right::from_wire(&name) {
                Some(right) => Some((right, granted)),
                None => {
                    tracing::debug!(right = %name, "ignoring unknown right in session record");
                    None
                }
            })
            .collect())
    }
}

// --- Session record ---

/// SessionRecord
///
/// The persisted proof of an authenticated user, as written by the login flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fio: Option<String>,
    pub rights: Rights,
}

impl SessionRecord {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Bearer token, if one is stored and non-empty.
    pub fn token(&self) -> Option<&str> {
        non_empty(&self.token)
    }

    /// A record proves authentication when any identifying field is non-empty.
    pub fn is_authenticated(&self) -> bool {
        non_empty(&self.token).is_some()
            || non_empty(&self.login).is_some()
            || non_empty(&self.fio).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// parse_session
///
/// Interprets a raw stored value. Anything that is not a JSON object with
/// correctly typed fields yields `None`: a corrupted record is never turned into a
/// partial session.
pub fn parse_session(raw: &str) -> Option<SessionRecord> {
    if raw.trim().is_empty() {
        return None;
    }

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "stored session is not an object");
            return None;
        }
        Err(e) => {
            tracing::debug!(error = %e, "stored session is not valid JSON");
            return None;
        }
    };

    serde_json::from_value(value)
        .inspect_err(|e| tracing::debug!(error = %e, "stored session has malformed fields"))
        .ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// --- Store contract ---

/// SessionStore
///
/// Accessor for the single persisted session record. Implementations never cache:
/// a login or logout performed elsewhere must be visible on the next read.
pub trait SessionStore: Send + Sync {
    /// Returns the current session, or `None` when absent or unreadable. Never fails.
    fn read_session(&self) -> Option<SessionRecord>;

    /// Removes the record. Storage failures are logged, not raised.
    fn clear_session(&self);

    /// Persists a record on behalf of the login flow.
    fn write_session(&self, session: &SessionRecord) -> Result<(), SessionStoreError>;
}

/// SessionState
///
/// The shared handle every component receives.
pub type SessionState = Arc<dyn SessionStore>;

/// FileSessionStore
///
/// Client-side persistent storage: one JSON document under
/// [`SESSION_STORAGE_KEY`] inside the configured directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn read_session(&self) -> Option<SessionRecord> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => parse_session(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session storage unreadable");
                None
            }
        }
    }

    fn clear_session(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "session cleared"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to clear session")
            }
        }
    }

    fn write_session(&self, session: &SessionRecord) -> Result<(), SessionStoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let encoded = serde_json::to_vec(session)?;

        // Readers must never see a half-written record.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// MemorySessionStore
///
/// In-memory store holding the raw stored string, used as a fake in tests and
/// by hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a raw value exactly as it would sit in storage.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn with_session(session: &SessionRecord) -> Self {
        Self {
            raw: Mutex::new(serde_json::to_string(session).ok()),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn read_session(&self) -> Option<SessionRecord> {
        self.raw().as_deref().and_then(parse_session)
    }

    fn clear_session(&self) {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn write_session(&self, session: &SessionRecord) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_string(session)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }
}
