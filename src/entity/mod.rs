//! Database entity models for tower-sessions-sdb-store.
//!
//! This module contains the Sea-ORM entity definitions used by
//! [`SeaOrmAdapter`](crate::SeaOrmAdapter). A SQL table stands in for a
//! key-value domain: every row is one item, identified by its domain and
//! item name.

/// Item entity model for Sea-ORM database interaction.
///
/// Contains the database schema representation for items stored on behalf
/// of the session store.
pub mod item;
