//! Data models for the dinner database.

use serde::{Deserialize, Serialize};

/// A scheduled family dinner.
///
/// `attendees` is a display string fixed at scheduling time (the attendee
/// names joined with ", "), not a reference to family member rows: renaming
/// or deleting a member does not rewrite past dinners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dinner {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub attendees: String,
}

/// A member of the household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub is_online: bool,
}

/// A conversation starter prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub text: String,
    pub category: String,
    /// Stamped by a column default at insert; nothing updates it afterwards.
    pub last_used: i64,
}

/// Summary row counts for the dinner database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub dinners: usize,
    pub family_members: usize,
    pub topics: usize,
}
