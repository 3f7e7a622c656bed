mod models;
mod schema;
mod store;

pub use models::{Dinner, FamilyMember, StoreStats, Topic};
pub use schema::DINNER_DB_SCHEMA;
pub use store::SqliteDinnerStore;

use anyhow::Result;
use tokio::sync::watch;

/// Storage surface for dinners, family members and conversation topics.
///
/// Writes are durable and become visible to the watch feeds as soon as they
/// commit. Missing rows on update/delete are treated as successful no-ops.
pub trait DinnerStore: Send + Sync {
    /// All dinners, newest identifier first.
    fn list_dinners(&self) -> Result<Vec<Dinner>>;

    /// All family members, in insertion order.
    fn list_family_members(&self) -> Result<Vec<FamilyMember>>;

    /// Live query over the dinners table. The receiver always holds the
    /// latest committed snapshot and observes every subsequent change until
    /// it is dropped.
    fn watch_dinners(&self) -> watch::Receiver<Vec<Dinner>>;

    /// Live query over the family members table.
    fn watch_family_members(&self) -> watch::Receiver<Vec<FamilyMember>>;

    /// Inserts a dinner with a freshly assigned identifier.
    fn insert_dinner(&self, date: &str, time: &str, attendees: &str) -> Result<()>;

    /// Inserts a family member with a freshly assigned identifier,
    /// initially offline.
    fn insert_family_member(&self, name: &str, role: &str) -> Result<()>;

    /// Sets the online status of a member. No-op if the id does not exist.
    fn update_member_status(&self, id: i64, online: bool) -> Result<()>;

    /// Deletes a member, matched by identifier. No-op if already absent.
    fn delete_family_member(&self, member: &FamilyMember) -> Result<()>;

    /// One topic chosen uniformly at random, or `None` if the table is empty.
    fn random_topic(&self) -> Result<Option<Topic>>;

    /// Populates the topics table from the fixed seed list if and only if it
    /// is empty. Safe to call concurrently; the seed runs at most once.
    fn seed_topics_if_empty(&self) -> Result<()>;

    /// Row counts per table.
    fn stats(&self) -> Result<StoreStats>;
}
