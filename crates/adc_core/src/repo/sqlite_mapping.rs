//! Table mappings and eager loading for SQLite-backed entities.
//!
//! # Responsibility
//! - Describe how each entity maps to one table and its column list.
//! - Convert between `rusqlite` rows and entity values.
//! - Load include paths one relation segment at a time.
//!
//! # Invariants
//! - Selected rows always start with `id`, followed by `COLUMNS` in order.
//! - `to_row()` yields exactly one value per entry in `COLUMNS`.
//! - Rows are loaded in ascending `id` order.

use super::{RepoError, RepoResult};
use crate::model::conversion::Conversion;
use crate::model::entity::{Entity, EntityId};
use crate::model::file_entry::{FileSystemEntry, FileSystemEntryType};
use crate::model::security::{Role, User, UserRole};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

/// Entity persisted in a single SQLite table keyed by `id`.
pub trait SqlEntity: Entity {
    const TABLE: &'static str;

    /// Persisted columns except `id`.
    const COLUMNS: &'static [&'static str];

    fn to_row(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Loads `relation` into `self`, then continues with `rest` on the loaded
    /// value(s).
    fn load_relation(&mut self, conn: &Connection, relation: &str, rest: &[&str])
        -> RepoResult<()>;
}

/// Loads every row of `T`'s table.
pub(crate) fn load_all<T: SqlEntity>(conn: &Connection) -> RepoResult<Vec<T>> {
    let sql = format!(
        "SELECT id, {} FROM {} ORDER BY id ASC;",
        T::COLUMNS.join(", "),
        T::TABLE
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(T::from_row(row)?);
    }
    Ok(items)
}

/// Loads the rows of `T` whose `column` equals `value`.
fn load_where<T: SqlEntity>(
    conn: &Connection,
    column: &str,
    value: EntityId,
) -> RepoResult<Vec<T>> {
    let sql = format!(
        "SELECT id, {} FROM {} WHERE {column} = ?1 ORDER BY id ASC;",
        T::COLUMNS.join(", "),
        T::TABLE
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query([value])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(T::from_row(row)?);
    }
    Ok(items)
}

/// Walks `segments` starting at `entity`.
pub(crate) fn load_path<T: SqlEntity>(
    entity: &mut T,
    conn: &Connection,
    segments: &[&str],
) -> RepoResult<()> {
    match segments.split_first() {
        Some((relation, rest)) => entity.load_relation(conn, relation, rest),
        None => Ok(()),
    }
}

/// One-to-many: children of `T` pointing back through `foreign_key`.
fn load_children<T: SqlEntity>(
    conn: &Connection,
    foreign_key: &str,
    parent_id: EntityId,
    rest: &[&str],
) -> RepoResult<Vec<T>> {
    let mut children = load_where::<T>(conn, foreign_key, parent_id)?;
    for child in &mut children {
        load_path(child, conn, rest)?;
    }
    Ok(children)
}

/// Many-to-one: the single `T` with identity `id`.
fn load_parent<T: SqlEntity>(
    conn: &Connection,
    id: EntityId,
    rest: &[&str],
) -> RepoResult<Option<T>> {
    let mut parent = load_where::<T>(conn, "id", id)?.into_iter().next();
    if let Some(parent) = parent.as_mut() {
        load_path(parent, conn, rest)?;
    }
    Ok(parent)
}

fn unknown_relation<T: Entity>(relation: &str) -> RepoError {
    RepoError::UnknownRelation {
        entity: T::NAME,
        relation: relation.to_string(),
    }
}

impl SqlEntity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "email",
        "first_name",
        "last_name",
        "photo",
        "in_active",
        "site_id",
        "concurrency_stamp",
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.email.clone()),
            Value::from(self.first_name.clone()),
            Value::from(self.last_name.clone()),
            Value::from(self.photo.clone()),
            Value::from(self.in_active),
            Value::from(self.site_id),
            Value::from(self.concurrency_stamp.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            photo: row.get(4)?,
            in_active: row.get(5)?,
            site_id: row.get(6)?,
            concurrency_stamp: row.get(7)?,
            user_roles: Vec::new(),
            file_system_entries: Vec::new(),
        })
    }

    fn load_relation(
        &mut self,
        conn: &Connection,
        relation: &str,
        rest: &[&str],
    ) -> RepoResult<()> {
        match relation {
            name if name == Self::USER_ROLES.name() => {
                self.user_roles = load_children(conn, "user_id", self.id, rest)?;
            }
            name if name == Self::FILE_SYSTEM_ENTRIES.name() => {
                self.file_system_entries = load_children(conn, "user_id", self.id, rest)?;
            }
            other => return Err(unknown_relation::<Self>(other)),
        }
        Ok(())
    }
}

impl SqlEntity for Role {
    const TABLE: &'static str = "roles";
    const COLUMNS: &'static [&'static str] = &["name", "concurrency_stamp"];

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.name.clone()),
            Value::from(self.concurrency_stamp.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            concurrency_stamp: row.get(2)?,
            user_roles: Vec::new(),
        })
    }

    fn load_relation(
        &mut self,
        conn: &Connection,
        relation: &str,
        rest: &[&str],
    ) -> RepoResult<()> {
        if relation != Self::USER_ROLES.name() {
            return Err(unknown_relation::<Self>(relation));
        }
        self.user_roles = load_children(conn, "role_id", self.id, rest)?;
        Ok(())
    }
}

impl SqlEntity for UserRole {
    const TABLE: &'static str = "user_roles";
    const COLUMNS: &'static [&'static str] = &["user_id", "role_id"];

    fn to_row(&self) -> Vec<Value> {
        vec![Value::from(self.user_id), Value::from(self.role_id)]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            role_id: row.get(2)?,
            user: None,
            role: None,
        })
    }

    fn load_relation(
        &mut self,
        conn: &Connection,
        relation: &str,
        rest: &[&str],
    ) -> RepoResult<()> {
        match relation {
            name if name == Self::USER.name() => {
                self.user = load_parent::<User>(conn, self.user_id, rest)?.map(Box::new);
            }
            name if name == Self::ROLE.name() => {
                self.role = load_parent(conn, self.role_id, rest)?;
            }
            other => return Err(unknown_relation::<Self>(other)),
        }
        Ok(())
    }
}

impl SqlEntity for FileSystemEntry {
    const TABLE: &'static str = "file_system_entries";
    const COLUMNS: &'static [&'static str] = &[
        "ready",
        "name",
        "content",
        "create_date",
        "change_date",
        "file_size",
        "file_type",
        "user_id",
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.ready),
            Value::from(self.name.clone()),
            Value::from(self.content.clone()),
            Value::from(self.create_date),
            Value::from(self.change_date),
            Value::from(self.file_size),
            Value::from(self.file_type.as_db().to_string()),
            Value::from(self.user_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let file_type: String = row.get(7)?;
        let file_type = FileSystemEntryType::parse_db(&file_type).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid file_type `{file_type}`"))
        })?;

        Ok(Self {
            id: row.get(0)?,
            ready: row.get(1)?,
            name: row.get(2)?,
            content: row.get(3)?,
            create_date: row.get(4)?,
            change_date: row.get(5)?,
            file_size: row.get(6)?,
            file_type,
            user_id: row.get(8)?,
            user: None,
        })
    }

    fn load_relation(
        &mut self,
        conn: &Connection,
        relation: &str,
        rest: &[&str],
    ) -> RepoResult<()> {
        if relation != Self::USER.name() {
            return Err(unknown_relation::<Self>(relation));
        }
        self.user = load_parent::<User>(conn, self.user_id, rest)?.map(Box::new);
        Ok(())
    }
}

impl SqlEntity for Conversion {
    const TABLE: &'static str = "conversions";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn to_row(&self) -> Vec<Value> {
        vec![Value::from(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn load_relation(
        &mut self,
        _conn: &Connection,
        relation: &str,
        _rest: &[&str],
    ) -> RepoResult<()> {
        Err(unknown_relation::<Self>(relation))
    }
}
