// Transaction management
use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

/// Opens transactions on a shared pool
#[derive(Clone, Debug)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a new transaction. Dropping it without `commit` rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::QueryFailed`] if no connection can be acquired.
    pub async fn begin(&self) -> DatabaseResult<Transaction<'static, Postgres>> {
        debug!("Beginning transaction");
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to begin transaction: {e}")))
    }

    /// Lock a row for the rest of the transaction with `SELECT ... FOR UPDATE`.
    ///
    /// `table` must be a trusted identifier. Returns `false` when no row matches.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    pub async fn lock_row(
        tx: &mut Transaction<'static, Postgres>,
        table: &'static str,
        id: Uuid,
    ) -> DatabaseResult<bool> {
        let sql = format!("SELECT 1 FROM {table} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut **tx).await?;
        Ok(row.is_some())
    }
}

