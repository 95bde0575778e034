use super::{LevelHandle, parse_level};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

/// Entrées en attente par abonné SSE avant qu'il ne décroche
const LIVE_BACKLOG: usize = 512;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: &Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.as_str().to_string(),
            target: target.to_string(),
            message,
        }
    }
}

struct Shared {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    level: RwLock<Level>,
    live: broadcast::Sender<LogEntry>,
    filter: Option<LevelHandle>,
}

/// Tampon circulaire des dernières entrées, partagé entre le subscriber et
/// les handlers HTTP
#[derive(Clone)]
pub struct LogState {
    shared: Arc<Shared>,
}

impl LogState {
    /// `filter` est la poignée du filtre global ; sans elle, changer le
    /// niveau ne touche que ce que les routes renvoient.
    pub fn new(capacity: usize, level: Level, filter: Option<LevelHandle>) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                level: RwLock::new(level),
                live: broadcast::channel(LIVE_BACKLOG).0,
                filter,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn level(&self) -> Level {
        *self
            .shared
            .level
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_level(&self, level: Level) {
        *self
            .shared
            .level
            .write()
            .unwrap_or_else(PoisonError::into_inner) = level;

        if let Some(filter) = &self.shared.filter {
            if let Err(e) = filter.reload(LevelFilter::from_level(level)) {
                eprintln!("Cannot change log level: {}", e);
            }
        }
    }

    /// Vrai si l'entrée passe le niveau courant
    pub fn accepts(&self, entry: &LogEntry) -> bool {
        parse_level(&entry.level).is_some_and(|level| level <= self.level())
    }

    pub(crate) fn record(&self, entry: LogEntry) {
        let mut entries = self.entries();
        if entries.len() == self.shared.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        // Envoi sous le verrou : `follow` ne voit chaque entrée qu'une fois.
        // Une erreur signifie seulement qu'aucun flux n'est ouvert.
        let _ = self.shared.live.send(entry);
    }

    /// Contenu actuel du tampon, du plus ancien au plus récent
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries().iter().cloned().collect()
    }

    /// Historique plus abonnement aux entrées suivantes, sans trou ni doublon
    pub fn follow(&self) -> (Vec<LogEntry>, broadcast::Receiver<LogEntry>) {
        let entries = self.entries();
        let receiver = self.shared.live.subscribe();
        (entries.iter().cloned().collect(), receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: Level, message: &str) -> LogEntry {
        LogEntry::new(&level, "jbxserver::test", message.to_string())
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let state = LogState::new(2, Level::TRACE, None);
        for message in ["first", "second", "third"] {
            state.record(entry(Level::INFO, message));
        }

        let messages: Vec<_> = state.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["second", "third"]);
    }

    #[test]
    fn test_zero_capacity_keeps_one_entry() {
        let state = LogState::new(0, Level::TRACE, None);
        state.record(entry(Level::INFO, "a"));
        state.record(entry(Level::INFO, "b"));
        assert_eq!(state.snapshot().len(), 1);
    }

    #[test]
    fn test_accepts_follows_level() {
        let state = LogState::new(8, Level::WARN, None);
        assert!(state.accepts(&entry(Level::ERROR, "e")));
        assert!(state.accepts(&entry(Level::WARN, "w")));
        assert!(!state.accepts(&entry(Level::INFO, "i")));

        state.set_level(Level::TRACE);
        assert_eq!(state.level(), Level::TRACE);
        assert!(state.accepts(&entry(Level::DEBUG, "d")));
    }

    #[tokio::test]
    async fn test_follow_splits_history_and_live() {
        let state = LogState::new(8, Level::TRACE, None);
        state.record(entry(Level::INFO, "before"));

        let (history, mut live) = state.follow();
        state.record(entry(Level::INFO, "after"));

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "before");
        assert_eq!(live.recv().await.unwrap().message, "after");
        assert!(live.try_recv().is_err());
    }
}
