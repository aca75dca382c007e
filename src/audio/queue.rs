use std::{collections::VecDeque, fmt};
use tracing::{debug, info};

/// A pending song reference.
///
/// Either an already-resolvable locator (a link the user posted, or an entry
/// expanded from a playlist) or a search term for the search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    DirectUrl(String),
    Search(String),
}

impl QueueItem {
    /// The string handed to the stream resolver.
    pub fn reference(&self) -> &str {
        match self {
            QueueItem::DirectUrl(url) => url,
            QueueItem::Search(term) => term,
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(self, QueueItem::Search(_))
    }
}

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reference())
    }
}

/// Per-guild ordered queue.
///
/// The FIFO never holds the item that is currently playing: it is moved into
/// `current` by [`GuildQueue::advance`].
#[derive(Debug, Default)]
pub struct GuildQueue {
    items: VecDeque<QueueItem>,
    current: Option<QueueItem>,
    loop_enabled: bool,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un item al final de la cola
    pub fn add(&mut self, item: QueueItem) {
        debug!("➕ Agregado a la cola: {}", item);
        self.items.push_back(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = QueueItem>) -> usize {
        let before = self.items.len();
        self.items.extend(items);
        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Returns the next item to play.
    ///
    /// With loop enabled and a current item, the current item is replayed and
    /// the FIFO is left untouched. An empty FIFO returns `None` without
    /// changing anything.
    pub fn advance(&mut self) -> Option<QueueItem> {
        if self.loop_enabled {
            if let Some(current) = &self.current {
                info!("🔂 Repitiendo: {}", current);
                return Some(current.clone());
            }
        }

        match self.items.pop_front() {
            Some(next) => {
                info!("➡️ Siguiente en cola (FIFO): {}", next);
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                debug!("📭 Cola vacía, no hay siguiente item");
                None
            }
        }
    }

    /// Empties the FIFO and forgets the current item. The loop flag survives.
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        info!("🗑️ Cola limpiada");
    }

    /// Forgets the current item so that a loop cannot replay it.
    pub fn release_current(&mut self) -> Option<QueueItem> {
        self.current.take()
    }

    /// Points `current` at a more specific item, e.g. the first entry of a
    /// playlist that was just expanded, so a loop replays that entry only.
    pub fn replace_current(&mut self, item: QueueItem) {
        if self.current.is_some() {
            self.current = Some(item);
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        if self.loop_enabled {
            info!("🔁 Repetición activada");
        } else {
            info!("➡️ Repetición desactivada");
        }
        self.loop_enabled
    }

    /// FIFO emptiness; the current item is not considered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn upcoming(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }
}
