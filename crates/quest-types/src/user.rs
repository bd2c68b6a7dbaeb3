//! Group members.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, UserId};

/// A registered member of the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub created_at: Timestamp,
}
