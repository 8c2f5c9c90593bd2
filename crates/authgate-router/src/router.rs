//! Router port (navigation primitive)

use parking_lot::Mutex;
use tracing::debug;

use crate::route::RouteInfo;

/// Moves the user between pages. Implemented by whatever renders them.
#[cfg_attr(test, mockall::automock)]
pub trait Router: Send + Sync {
    fn push(&self, url: &str);

    fn replace(&self, url: &str);

    /// Returns false when there is nothing to go back to.
    fn back(&self) -> bool;

    fn forward(&self) -> bool;

    fn current(&self) -> RouteInfo;
}

struct History {
    entries: Vec<String>,
    cursor: usize,
}

/// In-memory back/forward stack, used by the native shell and in tests.
pub struct HistoryRouter {
    history: Mutex<History>,
}

impl HistoryRouter {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![initial.to_string()],
                cursor: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.history.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().entries.is_empty()
    }
}

impl Default for HistoryRouter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Router for HistoryRouter {
    fn push(&self, url: &str) {
        let mut h = self.history.lock();
        let keep = h.cursor + 1;
        h.entries.truncate(keep);
        h.entries.push(url.to_string());
        h.cursor = keep;
        debug!("Router push {}", url);
    }

    fn replace(&self, url: &str) {
        let mut h = self.history.lock();
        let cursor = h.cursor;
        h.entries[cursor] = url.to_string();
        debug!("Router replace {}", url);
    }

    fn back(&self) -> bool {
        let mut h = self.history.lock();
        if h.cursor == 0 {
            return false;
        }
        h.cursor -= 1;
        true
    }

    fn forward(&self) -> bool {
        let mut h = self.history.lock();
        if h.cursor + 1 >= h.entries.len() {
            return false;
        }
        h.cursor += 1;
        true
    }

    fn current(&self) -> RouteInfo {
        let h = self.history.lock();
        RouteInfo::parse(&h.entries[h.cursor])
    }
}
