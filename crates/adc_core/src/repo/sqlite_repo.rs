//! SQLite implementation of the generic repository.
//!
//! # Responsibility
//! - Execute repository operations against a migrated `rusqlite::Connection`.
//! - Map the ownership protocol onto real SQLite transactions.
//! - Run bulk writes inside a savepoint so they are atomic in any context.
//!
//! # Invariants
//! - A transaction is active iff the connection is not in autocommit mode.
//! - Only the repository holding the live `Transaction` handle is the owner.
//! - Dropping an owning repository rolls its transaction back.
//! - Every write validates the whole batch before touching the database.

use super::sqlite_mapping::{load_all, load_path, SqlEntity};
use super::{validate_all, RepoError, RepoResult, Repository};
use crate::db::migrations::{latest_version, schema_version};
use crate::query::include::resolve_includes;
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::marker::PhantomData;

const BULK_SAVEPOINT: &str = "adc_bulk_write";

/// Repository for one SQL-mapped entity type over a borrowed connection.
///
/// Several repositories may share one connection; they then share its
/// transaction as well.
pub struct SqliteRepository<'conn, T> {
    conn: &'conn Connection,
    owned_tx: Option<Transaction<'conn>>,
    _entity: PhantomData<fn() -> T>,
}

impl<'conn, T: SqlEntity> SqliteRepository<'conn, T> {
    /// Creates a repository after checking the connection is migrated and
    /// carries `T`'s table and columns.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready::<T>(conn)?;
        Ok(Self {
            conn,
            owned_tx: None,
            _entity: PhantomData,
        })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Runs `work` inside a dedicated savepoint; any failure rolls back to it.
    fn with_savepoint<R>(
        &mut self,
        operation: &'static str,
        work: impl FnOnce(&mut Self) -> RepoResult<R>,
    ) -> RepoResult<R> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {BULK_SAVEPOINT};"))?;

        match work(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {BULK_SAVEPOINT};"))?;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event={} module=repo status=rolled_back entity={} error={}",
                    operation,
                    T::NAME,
                    err
                );
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {BULK_SAVEPOINT}; RELEASE {BULK_SAVEPOINT};"
                )) {
                    warn!(
                        "event={} module=repo status=error entity={} error_code=savepoint_rollback_failed error={}",
                        operation,
                        T::NAME,
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

impl<'conn, T: SqlEntity> Repository<T> for SqliteRepository<'conn, T> {
    fn query(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>> {
        let mut items = load_all::<T>(self.conn)?;
        for path in resolve_includes(T::NAME, params.include_list()) {
            let segments = path.segments();
            for item in &mut items {
                load_path(item, self.conn, &segments)?;
            }
        }
        Ok(params.apply(items))
    }

    fn create_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<Vec<T>> {
        validate_all(&models)?;

        let mut stmt = self.conn.prepare_cached(&insert_sql::<T>())?;
        let mut created = Vec::with_capacity(models.len());
        for mut model in models {
            stmt.execute(params_from_iter(model.to_row()))?;
            model.set_id(self.conn.last_insert_rowid());
            created.push(model);
        }
        Ok(created)
    }

    fn update_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<()> {
        validate_all(&models)?;

        let mut stmt = self.conn.prepare_cached(&update_sql::<T>())?;
        for model in &models {
            let mut values = model.to_row();
            values.push(Value::from(model.id()));
            stmt.execute(params_from_iter(values))?;
        }
        Ok(())
    }

    fn delete_no_transaction(&mut self, predicate: &Predicate<T>) -> RepoResult<usize> {
        let matches = self.query(&QueryParams::filtered(predicate.clone()))?;
        let mut stmt = self
            .conn
            .prepare_cached(&format!("DELETE FROM {} WHERE id = ?1;", T::TABLE))?;
        let mut deleted = 0;
        for model in &matches {
            deleted += stmt.execute([model.id()])?;
        }
        Ok(deleted)
    }

    fn create_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        validate_all(&models)?;
        let count = models.len();
        self.with_savepoint("create_bulk", |repo| {
            repo.create_many_no_transaction(models).map(|_| ())
        })?;
        debug!(
            "event=create_bulk module=repo status=ok entity={} rows={}",
            T::NAME,
            count
        );
        Ok(())
    }

    fn update_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        validate_all(&models)?;
        let count = models.len();
        self.with_savepoint("update_bulk", |repo| {
            repo.update_many_no_transaction(models)
        })?;
        debug!(
            "event=update_bulk module=repo status=ok entity={} rows={}",
            T::NAME,
            count
        );
        Ok(())
    }

    fn is_in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn is_transaction_owner(&self) -> bool {
        self.owned_tx.is_some()
    }

    fn begin_transaction(&mut self) -> RepoResult<()> {
        if self.is_in_transaction() {
            return Ok(());
        }
        self.owned_tx = Some(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?);
        debug!(
            "event=tx_begin module=repo status=ok backend=sqlite entity={}",
            T::NAME
        );
        Ok(())
    }

    fn commit_transaction(&mut self) -> RepoResult<()> {
        let Some(tx) = self.owned_tx.take() else {
            return Ok(());
        };
        tx.commit()?;
        debug!(
            "event=tx_commit module=repo status=ok backend=sqlite entity={}",
            T::NAME
        );
        Ok(())
    }

    fn rollback_transaction(&mut self) -> RepoResult<()> {
        let Some(tx) = self.owned_tx.take() else {
            return Ok(());
        };
        tx.rollback()?;
        debug!(
            "event=tx_rollback module=repo status=ok backend=sqlite entity={}",
            T::NAME
        );
        Ok(())
    }
}

fn insert_sql<T: SqlEntity>() -> String {
    let placeholders = (1..=T::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders});",
        T::TABLE,
        T::COLUMNS.join(", ")
    )
}

fn update_sql<T: SqlEntity>() -> String {
    let assignments = T::COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE id = ?{};",
        T::TABLE,
        T::COLUMNS.len() + 1
    )
}

fn ensure_connection_ready<T: SqlEntity>(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, T::TABLE)? {
        return Err(RepoError::MissingRequiredTable(T::TABLE));
    }

    for &column in std::iter::once(&"id").chain(T::COLUMNS.iter()) {
        if !table_has_column(conn, T::TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: T::TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{insert_sql, update_sql};
    use crate::model::security::Role;

    #[test]
    fn statements_follow_column_order() {
        assert_eq!(
            insert_sql::<Role>(),
            "INSERT INTO roles (name, concurrency_stamp) VALUES (?1, ?2);"
        );
        assert_eq!(
            update_sql::<Role>(),
            "UPDATE roles SET name = ?1, concurrency_stamp = ?2 WHERE id = ?3;"
        );
    }
}
