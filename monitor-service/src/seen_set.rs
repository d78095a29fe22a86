use birdwatch_core::BotError;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Most recent entries kept; older ids are evicted first.
const CAPACITY: usize = 1000;

/// Dedup ledger of tweet ids already handled. Keeps append order for FIFO
/// eviction at capacity alongside a hash set for membership checks. An id
/// recorded here is never re-enqueued by any producer.
#[derive(Debug)]
pub struct SeenSet {
    path: PathBuf,
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl SeenSet {
    /// Loads the ledger from `path`. A missing or unparseable file yields an
    /// empty set; dedup storage is best-effort and never fails startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut set = Self {
            path: path.into(),
            capacity: CAPACITY,
            order: VecDeque::new(),
            members: HashSet::new(),
        };

        match std::fs::read_to_string(&set.path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => {
                    debug!(
                        "Loaded {} seen tweet ids from {}",
                        ids.len(),
                        set.path.display()
                    );
                    for id in ids {
                        set.mark_seen(id);
                    }
                }
                Err(e) => warn!(
                    "Could not parse seen-tweets file {}, starting empty: {}",
                    set.path.display(),
                    e
                ),
            },
            Err(_) => debug!(
                "No seen-tweets file at {}, starting empty",
                set.path.display()
            ),
        }
        set
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn mark_seen(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Writes the ledger back to storage. Called once per producer batch
    /// rather than per insertion.
    pub fn persist(&self) -> Result<(), BotError> {
        let ids: Vec<&String> = self.order.iter().collect();
        let raw = serde_json::to_string(&ids)?;
        std::fs::write(&self.path, raw)?;
        debug!("Saved {} seen tweet ids", ids.len());
        Ok(())
    }
}
