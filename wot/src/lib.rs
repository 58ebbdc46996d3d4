//! Web-of-trust scoring.
//!
//! Given a root identity, [`TrustGraphScorer`] walks the follow graph
//! breadth-first to a bounded depth and assigns every discovered author an
//! integer trust score. Scores decay with each hop; when an author is
//! reachable along several paths the best (shortest) path wins.
//!
//! The follow graph itself lives on the federated network and is reached
//! through the [`GraphQuery`] collaborator, so the scorer never touches the
//! network directly.

pub mod config;
pub mod error;
pub mod graph;
pub mod scorer;
pub mod slots;
pub mod snapshot;
pub mod table;

pub use config::WotConfig;
pub use error::{GraphError, WotError};
pub use graph::{FollowEdge, GraphQuery};
pub use scorer::TrustGraphScorer;
pub use slots::{LoadStatus, SlotKind, TrustSlot, TrustSlots};
pub use snapshot::SnapshotGraph;
pub use table::TrustScoreTable;
