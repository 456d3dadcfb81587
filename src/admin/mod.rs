//! Screen-level rules for the admin dashboard.

pub mod autojoin;
pub mod bulk;
pub mod feedback;
pub mod injury_ban;
