use {
    super::{PaymentFilter, PaymentStore},
    crate::domain::error::PaymentError,
    crate::domain::id::{OrderId, PaymentId},
    crate::domain::payment::{Payment, PaymentRecord, StatusChange},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Row, postgres::PgRow},
};

const SELECT_COLUMNS: &str = "payment_id, order_id, amount, currency, method, provider, \
     payer_id, recipient_id, branch_id, status, external_payment_key, version, \
     refunded_amount, failure_reason, created_at, expires_at, approved_at, cancelled_at, \
     refunded_at";

/// Postgres-backed store. The version predicate on every UPDATE is the
/// whole concurrency story: a lost race shows up as zero affected rows,
/// never as a blocked transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_payment(row: &PgRow) -> Result<Payment, PaymentError> {
    let record = PaymentRecord {
        payment_id: row.try_get("payment_id")?,
        order_id: row.try_get("order_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        method: row.try_get("method")?,
        provider: row.try_get("provider")?,
        payer_id: row.try_get("payer_id")?,
        recipient_id: row.try_get("recipient_id")?,
        branch_id: row.try_get("branch_id")?,
        status: row.try_get("status")?,
        external_payment_key: row.try_get("external_payment_key")?,
        version: row.try_get("version")?,
        refunded_amount: row.try_get("refunded_amount")?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        approved_at: row.try_get("approved_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        refunded_at: row.try_get("refunded_at")?,
    };
    Payment::try_from(record)
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create(&self, payment: Payment) -> Result<Payment, PaymentError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments
                (payment_id, order_id, amount, currency, method, provider,
                 payer_id, recipient_id, branch_id, status, version,
                 refunded_amount, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(payment.payment_id().as_str())
        .bind(payment.order_id().as_str())
        .bind(payment.amount().amount().minor())
        .bind(payment.amount().currency().as_str())
        .bind(payment.method().as_str())
        .bind(payment.provider().as_str())
        .bind(payment.payer_id())
        .bind(payment.recipient_id())
        .bind(payment.branch_id())
        .bind(payment.status().as_str())
        .bind(payment.version())
        .bind(payment.refunded_amount().minor())
        .bind(payment.created_at())
        .bind(payment.expires_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::DuplicateOrderId(
                payment.order_id().as_str().to_string(),
            ));
        }
        Ok(payment)
    }

    async fn get_by_payment_id(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PaymentError::NotFound(id.as_str().to_string()))?;

        row_to_payment(&row)
    }

    async fn get_by_order_id(&self, order_id: &OrderId) -> Result<Payment, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PaymentError::NotFound(order_id.as_str().to_string()))?;

        row_to_payment(&row)
    }

    async fn compare_and_swap_status(
        &self,
        id: &PaymentId,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Payment, PaymentError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments SET
                status = $3,
                version = version + 1,
                approved_at = COALESCE($4, approved_at),
                cancelled_at = COALESCE($5, cancelled_at),
                refunded_at = COALESCE($6, refunded_at),
                refunded_amount = COALESCE($7, refunded_amount),
                external_payment_key = COALESCE($8, external_payment_key),
                failure_reason = COALESCE($9, failure_reason)
            WHERE payment_id = $1 AND version = $2
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(expected_version)
        .bind(change.new_status().as_str())
        .bind(change.approved_at())
        .bind(change.cancelled_at())
        .bind(change.refunded_at())
        .bind(change.refunded_amount().map(|a| a.minor()))
        .bind(change.external_payment_key())
        .bind(change.failure_reason())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_payment(&row),
            None => {
                // Distinguish a lost race from a missing row.
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payments WHERE payment_id = $1)")
                        .bind(id.as_str())
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Err(PaymentError::VersionConflict {
                        payment_id: id.as_str().to_string(),
                        expected: expected_version,
                    })
                } else {
                    Err(PaymentError::NotFound(id.as_str().to_string()))
                }
            }
        }
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, PaymentError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM payments
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR method = $2)
              AND ($3::text IS NULL OR provider = $3)
              AND ($4::bigint IS NULL OR payer_id = $4)
              AND ($5::bigint IS NULL OR branch_id = $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at < $7)
            ORDER BY created_at
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.method.map(|m| m.as_str()))
        .bind(filter.provider.map(|p| p.as_str()))
        .bind(filter.payer_id)
        .bind(filter.branch_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment).collect()
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM payments
            WHERE status = 'PENDING' AND expires_at < $1
            ORDER BY expires_at
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment).collect()
    }
}
