//! Item entity model for Sea-ORM database interaction.
//!
//! This module defines the database schema representation for key-value
//! items. It provides the Sea-ORM entity definition that maps to the
//! `sdb_items` table.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one key-value item.
///
/// # Database Schema
///
/// | Column   | Type               | Description                                   |
/// |----------|--------------------|-----------------------------------------------|
/// | domain   | TEXT (Primary Key) | Domain (logical table) the item belongs to    |
/// | name     | TEXT (Primary Key) | Item name, the session key                    |
/// | data     | BYTEA / BLOB       | MessagePack-packed attribute map              |
/// | expires  | BIGINT NULL        | Copy of the `expires` attribute, epoch millis |
///
/// The `expires` column exists so cleanup can filter and index expired items
/// without unpacking `data`. Items with a missing or non-numeric `expires`
/// attribute store `NULL` there and are never selected for cleanup.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sdb_items")]
pub struct Model {
    /// Domain name, first half of the composite primary key.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub domain: String,

    /// Item name, second half of the composite primary key.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub name: String,

    /// MessagePack-serialized attribute map.
    pub data: Vec<u8>,

    /// Expiration timestamp in epoch milliseconds, if the item carries one.
    pub expires: Option<i64>,
}

/// This entity doesn't have any relations to other entities, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
