//! Remote entity store.
//!
//! Written by the network context (`apply_snapshot`), read and eased by the
//! render loop. A single mutex guards the whole map, so a reader sees the
//! state either before or after a snapshot, never halfway through one.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use platformer_shared::{math::Vec2, net::SnapshotEntries};

use crate::interp;

/// A peer as this client draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: String,
    /// Last drawn position. Owned by interpolation.
    pub current: Vec2,
    /// Last position reported by the server.
    pub target: Vec2,
    pub username: Option<String>,
    pub score: Option<i64>,
}

/// What one snapshot did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Entries whose state could not be read.
    pub skipped: usize,
}

/// Remote players keyed by server-assigned identity.
#[derive(Debug, Default)]
pub struct RemoteEntityStore {
    entities: Mutex<BTreeMap<String, RemoteEntity>>,
}

impl RemoteEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, RemoteEntity>> {
        // Every mutation leaves the map consistent, so a panic elsewhere
        // cannot leave it torn.
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconciles the store with a full server snapshot.
    ///
    /// New identities appear at their reported position; known ones only get
    /// a new target. Identities missing from the snapshot, and `self_id`,
    /// are dropped. Entries that failed to parse keep an existing entity as
    /// it was and create nothing.
    pub fn apply_snapshot(&self, snapshot: &SnapshotEntries, self_id: Option<&str>) -> SnapshotStats {
        let mut stats = SnapshotStats::default();
        let mut entities = self.lock();

        for (id, report) in snapshot {
            if Some(id.as_str()) == self_id {
                continue;
            }
            let Some(report) = report else {
                stats.skipped += 1;
                continue;
            };
            let reported = Vec2::new(report.x, report.y);
            match entities.get_mut(id) {
                Some(entity) => {
                    entity.target = reported;
                    if report.username.is_some() {
                        entity.username = report.username.clone();
                    }
                    if report.score.is_some() {
                        entity.score = report.score;
                    }
                    stats.updated += 1;
                }
                None => {
                    entities.insert(
                        id.clone(),
                        RemoteEntity {
                            id: id.clone(),
                            current: reported,
                            target: reported,
                            username: report.username.clone(),
                            score: report.score,
                        },
                    );
                    stats.inserted += 1;
                }
            }
        }

        let before = entities.len();
        entities.retain(|id, _| snapshot.contains_key(id) && Some(id.as_str()) != self_id);
        stats.removed = before - entities.len();
        stats
    }

    /// Copies the current entities for drawing, in identity order.
    pub fn snapshot_for_render(&self) -> Vec<RemoteEntity> {
        self.lock().values().cloned().collect()
    }

    /// Eases every entity toward its target by `blend`.
    pub fn interpolate(&self, blend: f32) {
        for entity in self.lock().values_mut() {
            interp::advance(entity, blend);
        }
    }

    pub fn get(&self, id: &str) -> Option<RemoteEntity> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
