//! Caller-side cache of computed trust tables.
//!
//! The hub keeps two tables around: one rooted at the site's curator key and
//! one rooted at the logged-in user. Each slot tracks its load status and
//! holds the last table that loaded successfully.

use modhub_types::PublicKey;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::{GraphQuery, TrustGraphScorer, TrustScoreTable, WotError};

/// Load status of a trust slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Which trust table a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Rooted at the site's curator identity.
    Site,
    /// Rooted at the logged-in user.
    User,
}

#[derive(Debug, Clone, Default)]
pub struct TrustSlot {
    status: LoadStatus,
    table: Option<Arc<TrustScoreTable>>,
}

impl TrustSlot {
    pub fn status(&self) -> LoadStatus {
        self.status
    }

    /// The last successfully loaded table. Kept across a failed refresh.
    pub fn table(&self) -> Option<&Arc<TrustScoreTable>> {
        self.table.as_ref()
    }
}

/// The site and user trust slots.
#[derive(Debug, Clone, Default)]
pub struct TrustSlots {
    site: TrustSlot,
    user: TrustSlot,
}

impl TrustSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, kind: SlotKind) -> &TrustSlot {
        match kind {
            SlotKind::Site => &self.site,
            SlotKind::User => &self.user,
        }
    }

    fn slot_mut(&mut self, kind: SlotKind) -> &mut TrustSlot {
        match kind {
            SlotKind::Site => &mut self.site,
            SlotKind::User => &mut self.user,
        }
    }

    /// Mark a slot as loading.
    pub fn begin(&mut self, kind: SlotKind) {
        self.slot_mut(kind).status = LoadStatus::Loading;
    }

    /// Replace a slot's table wholesale.
    pub fn complete(&mut self, kind: SlotKind, table: TrustScoreTable) -> Arc<TrustScoreTable> {
        let table = Arc::new(table);
        let slot = self.slot_mut(kind);
        slot.status = LoadStatus::Loaded;
        slot.table = Some(Arc::clone(&table));
        table
    }

    /// Mark a slot as failed, keeping its previous table.
    pub fn fail(&mut self, kind: SlotKind) {
        self.slot_mut(kind).status = LoadStatus::Failed;
    }

    /// Reset a slot to idle and drop its table (e.g. on logout).
    pub fn clear(&mut self, kind: SlotKind) {
        *self.slot_mut(kind) = TrustSlot::default();
    }

    /// The table consumers should rank by: the user's once loaded, otherwise
    /// the site's.
    pub fn effective(&self) -> Option<&Arc<TrustScoreTable>> {
        match (&self.user.status, &self.user.table) {
            (LoadStatus::Loaded, Some(table)) => Some(table),
            _ => self.site.table.as_ref(),
        }
    }

    /// Recompute a slot's table for `root` and store it.
    pub async fn refresh<G>(
        &mut self,
        kind: SlotKind,
        root: PublicKey,
        scorer: &TrustGraphScorer,
        graph: &G,
    ) -> Result<Arc<TrustScoreTable>, WotError>
    where
        G: GraphQuery + ?Sized,
    {
        self.begin(kind);
        match scorer.compute(root, graph).await {
            Ok(table) => Ok(self.complete(kind, table)),
            Err(e) => {
                warn!(slot = ?kind, root = %root, error = %e, "trust refresh failed");
                self.fail(kind);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(root: u8) -> TrustScoreTable {
        TrustScoreTable::new(PublicKey::new([root; 32]), 100)
    }

    #[test]
    fn slots_start_idle() {
        let slots = TrustSlots::new();
        assert_eq!(slots.slot(SlotKind::Site).status(), LoadStatus::Idle);
        assert!(slots.slot(SlotKind::User).table().is_none());
        assert!(slots.effective().is_none());
    }

    #[test]
    fn failure_keeps_previous_table() {
        let mut slots = TrustSlots::new();
        slots.begin(SlotKind::Site);
        slots.complete(SlotKind::Site, table(1));
        slots.begin(SlotKind::Site);
        slots.fail(SlotKind::Site);

        let slot = slots.slot(SlotKind::Site);
        assert_eq!(slot.status(), LoadStatus::Failed);
        assert_eq!(slot.table().unwrap().root(), &PublicKey::new([1; 32]));
    }

    #[test]
    fn effective_prefers_loaded_user_table() {
        let mut slots = TrustSlots::new();
        slots.complete(SlotKind::Site, table(1));
        assert_eq!(slots.effective().unwrap().root(), &PublicKey::new([1; 32]));

        slots.complete(SlotKind::User, table(2));
        assert_eq!(slots.effective().unwrap().root(), &PublicKey::new([2; 32]));

        slots.clear(SlotKind::User);
        assert_eq!(slots.slot(SlotKind::User).status(), LoadStatus::Idle);
        assert_eq!(slots.effective().unwrap().root(), &PublicKey::new([1; 32]));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LoadStatus::Loading).unwrap(),
            "\"loading\""
        );
    }
}
