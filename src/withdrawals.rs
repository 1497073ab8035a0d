//! Withdrawal ledger — disbursement requests and their approval flow.
//!
//! The reconciliation invariant (total disbursed never exceeds
//! collected − fees) is enforced twice: a best-effort check at request
//! time, and authoritatively at approval time by a single conditional
//! UPDATE whose guard recomputes the balance inside the statement.  Two
//! near-simultaneous approvals for the same campaign therefore cannot
//! over-disburse: the database serialises the statements and the second
//! guard sees the first one's effect.

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::aggregate;
use crate::campaigns;
use crate::errors::{LedgerError, Result};
use crate::lifecycle;
use crate::models::{Caller, Withdrawal, WithdrawalStatus};

const WITHDRAWAL_COLUMNS: &str = "id, campaign_id, amount, bank_name, bank_account, account_holder, \
     proof_url, notes, status, requested_by, rejected_reason, created_at, resolved_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewWithdrawal {
    /// Minor units; must be positive.
    pub amount: i64,
    pub bank_name: String,
    pub bank_account: String,
    pub account_holder: String,
    pub notes: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────

/// File a disbursement request against a campaign.
///
/// Owner or admin only, while the campaign is `active` or `paused`.  The
/// funds check here is best-effort; the approval step re-validates.
pub async fn request(
    pool: &SqlitePool,
    caller: &Caller,
    campaign_id: i64,
    input: NewWithdrawal,
    now: i64,
) -> Result<Withdrawal> {
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may request a withdrawal".into(),
        ));
    }
    if !lifecycle::accepts_withdrawal(&campaign) {
        return Err(LedgerError::ConflictingStatus(format!(
            "campaign '{}' is {} and cannot accept withdrawal requests",
            campaign.slug,
            campaign.status.as_str()
        )));
    }
    if input.amount <= 0 {
        return Err(LedgerError::InvalidInput(
            "withdrawal amount must be positive".into(),
        ));
    }
    if input.bank_name.trim().is_empty()
        || input.bank_account.trim().is_empty()
        || input.account_holder.trim().is_empty()
    {
        return Err(LedgerError::InvalidInput(
            "bank name, account number, and account holder are required".into(),
        ));
    }

    let available = aggregate::totals(pool, campaign_id).await?.available();
    if input.amount > available {
        return Err(LedgerError::InsufficientFunds {
            requested: input.amount,
            available,
        });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO withdrawals
            (campaign_id, amount, bank_name, bank_account, account_holder,
             notes, status, requested_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8)
        "#,
    )
    .bind(campaign_id)
    .bind(input.amount)
    .bind(&input.bank_name)
    .bind(&input.bank_account)
    .bind(&input.account_holder)
    .bind(&input.notes)
    .bind(&caller.user_id)
    .bind(now)
    .execute(pool)
    .await?;

    fetch(pool, result.last_insert_rowid()).await
}

// ─────────────────────────────────────────────────────────
// Approval / rejection
// ─────────────────────────────────────────────────────────

/// Approve a pending withdrawal: `pending → completed`.  Admin only.
///
/// The guard subquery recomputes collected − fees − disbursed at the moment
/// of the write, so approval of an amount the campaign can no longer cover
/// leaves the row `pending` and fails with
/// [`LedgerError::InsufficientFunds`].  Approving an already-completed
/// withdrawal is an idempotent no-op.
pub async fn approve(
    pool: &SqlitePool,
    caller: &Caller,
    withdrawal_id: i64,
    now: i64,
) -> Result<Withdrawal> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden(
            "only an admin may approve a withdrawal".into(),
        ));
    }

    let moved = sqlx::query(
        r#"
        UPDATE withdrawals
        SET    status = 'completed', resolved_at = ?2
        WHERE  id = ?1
          AND  status = 'pending'
          AND  amount <= (
                 COALESCE((SELECT SUM(d.amount) FROM donations d
                           WHERE d.campaign_id = withdrawals.campaign_id
                             AND d.status IN ('paid', 'settled', 'completed')), 0)
               - COALESCE((SELECT SUM(d.fee) FROM donations d
                           WHERE d.campaign_id = withdrawals.campaign_id
                             AND d.status IN ('paid', 'settled', 'completed')), 0)
               - COALESCE((SELECT SUM(w.amount) FROM withdrawals w
                           WHERE w.campaign_id = withdrawals.campaign_id
                             AND w.status = 'completed'), 0)
               )
        "#,
    )
    .bind(withdrawal_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let withdrawal = fetch(pool, withdrawal_id).await?;
    if moved > 0 {
        info!(
            "Withdrawal {withdrawal_id} for campaign {} approved by {}",
            withdrawal.campaign_id, caller.user_id
        );
        return Ok(withdrawal);
    }
    match withdrawal.status {
        WithdrawalStatus::Completed => Ok(withdrawal),
        WithdrawalStatus::Rejected => Err(LedgerError::ConflictingStatus(format!(
            "withdrawal {withdrawal_id} was rejected and cannot be approved"
        ))),
        WithdrawalStatus::Pending => {
            // Still pending, so the funds guard is what stopped the write.
            let available = aggregate::totals(pool, withdrawal.campaign_id)
                .await?
                .available();
            Err(LedgerError::InsufficientFunds {
                requested: withdrawal.amount,
                available,
            })
        }
    }
}

/// Reject a pending withdrawal: `pending → rejected`.  Admin only;
/// terminal, no funds effect.  Idempotent on repeat rejection.
pub async fn reject(
    pool: &SqlitePool,
    caller: &Caller,
    withdrawal_id: i64,
    reason: Option<String>,
    now: i64,
) -> Result<Withdrawal> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden(
            "only an admin may reject a withdrawal".into(),
        ));
    }

    let moved = sqlx::query(
        "UPDATE withdrawals SET status = 'rejected', rejected_reason = ?2, resolved_at = ?3 \
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(withdrawal_id)
    .bind(&reason)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let withdrawal = fetch(pool, withdrawal_id).await?;
    if moved > 0 || withdrawal.status == WithdrawalStatus::Rejected {
        Ok(withdrawal)
    } else {
        Err(LedgerError::ConflictingStatus(format!(
            "withdrawal {withdrawal_id} is already {} and cannot be rejected",
            withdrawal.status.as_str()
        )))
    }
}

/// Attach a proof-of-transfer URL to a completed withdrawal.  Admin only.
pub async fn attach_proof(
    pool: &SqlitePool,
    caller: &Caller,
    withdrawal_id: i64,
    proof_url: String,
) -> Result<Withdrawal> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden(
            "only an admin may attach transfer proof".into(),
        ));
    }
    if proof_url.trim().is_empty() {
        return Err(LedgerError::InvalidInput("proof URL must not be empty".into()));
    }

    let updated = sqlx::query(
        "UPDATE withdrawals SET proof_url = ?2 WHERE id = ?1 AND status = 'completed'",
    )
    .bind(withdrawal_id)
    .bind(&proof_url)
    .execute(pool)
    .await?
    .rows_affected();

    let withdrawal = fetch(pool, withdrawal_id).await?;
    if updated > 0 {
        Ok(withdrawal)
    } else {
        Err(LedgerError::ConflictingStatus(format!(
            "withdrawal {withdrawal_id} is {}; proof can only be attached once completed",
            withdrawal.status.as_str()
        )))
    }
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

pub async fn fetch(pool: &SqlitePool, withdrawal_id: i64) -> Result<Withdrawal> {
    sqlx::query_as::<_, Withdrawal>(&format!(
        "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = ?1"
    ))
    .bind(withdrawal_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("withdrawal {withdrawal_id} does not exist")))
}

/// All withdrawals for a campaign, newest first.  Owner or admin only —
/// bank details are not a public record.
pub async fn list_for_campaign(
    pool: &SqlitePool,
    caller: &Caller,
    campaign_id: i64,
) -> Result<Vec<Withdrawal>> {
    let campaign = campaigns::fetch(pool, campaign_id).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may list withdrawals".into(),
        ));
    }
    let rows = sqlx::query_as::<_, Withdrawal>(&format!(
        "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals \
         WHERE campaign_id = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
