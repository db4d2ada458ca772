//! Token-keyed engine registry shared across request handlers.
//!
//! Each session owns an independent [`HeartRateEngine`] behind its own
//! mutex, so frames for different tokens never contend beyond the short
//! map lookup. Removing a session while a frame is in flight is safe: the
//! in-flight call holds its own `Arc` and finishes against the detached
//! engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::session::domain::engine::{EngineError, HeartRateEngine};
use crate::session::domain::engine_config::ConfigError;
use crate::shared::frame::Frame;

pub type EngineFactory = Box<dyn Fn() -> Result<HeartRateEngine, ConfigError> + Send + Sync>;
pub type SharedEngine = Arc<Mutex<HeartRateEngine>>;

struct Entry {
    engine: SharedEngine,
    last_access: Instant,
}

pub struct SessionRegistry {
    factory: EngineFactory,
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the engine for `token`, creating it on first use.
    pub fn get_or_create(&self, token: &str) -> Result<SharedEngine, EngineError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| EngineError::Poisoned(token.to_string()))?;

        if let Some(entry) = sessions.get_mut(token) {
            entry.last_access = Instant::now();
            return Ok(entry.engine.clone());
        }

        let engine = Arc::new(Mutex::new((self.factory)()?));
        log::info!("Started session '{token}'");
        sessions.insert(
            token.to_string(),
            Entry {
                engine: engine.clone(),
                last_access: Instant::now(),
            },
        );
        Ok(engine)
    }

    /// Runs one frame through the session's engine.
    pub fn process(&self, token: &str, frame: Option<&Frame>) -> Result<Option<f64>, EngineError> {
        let engine = self.get_or_create(token)?;
        let mut engine = engine
            .lock()
            .map_err(|_| EngineError::Poisoned(token.to_string()))?;
        engine.process_frame(frame)
    }

    /// Drops the session. Returns `false` if it did not exist.
    pub fn remove(&self, token: &str) -> bool {
        let removed = match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(token).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(token).is_some(),
        };
        if removed {
            log::info!("Ended session '{token}'");
        }
        removed
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(token))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every session untouched for at least `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|token, entry| {
            let keep = now.duration_since(entry.last_access) < max_idle;
            if !keep {
                log::info!("Evicted idle session '{token}'");
            }
            keep
        });
        before - sessions.len()
    }
}
