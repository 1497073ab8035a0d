//! Donation record store — append-mostly persistence of donation attempts
//! and their payment status transitions.
//!
//! A donation is created `pending` when checkout is initiated and moves to
//! a settled status or `failed`/`expired` via the payment-gateway callback
//! (webhook or active status poll — both land on the same transition
//! functions).  Status transitions are compare-and-swap UPDATEs guarded on
//! `pending`, so a duplicate webhook delivery can never double-count.

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::campaigns;
use crate::errors::{LedgerError, Result};
use crate::lifecycle;
use crate::models::{Donation, DonationStatus};

/// Placeholder shown for donors who gave no display name.
pub const ANONYMOUS_DONOR: &str = "Anonymous";

const DONATION_COLUMNS: &str = "id, campaign_id, user_id, amount, fee, status, donor_name, message, \
     payment_method, created_at, settled_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewDonation {
    /// Minor units; must be positive.
    pub amount: i64,
    /// `None` = anonymous donor.
    pub user_id: Option<String>,
    pub donor_name: Option<String>,
    pub message: Option<String>,
    pub payment_method: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────

/// Record a new donation attempt in `pending` status.
///
/// The campaign read applies lazy expiry first, so a donation can never be
/// attached to a campaign whose end date has passed.
pub async fn create(
    pool: &SqlitePool,
    campaign_id: i64,
    input: NewDonation,
    now: i64,
) -> Result<Donation> {
    if input.amount <= 0 {
        return Err(LedgerError::InvalidInput(
            "donation amount must be positive".into(),
        ));
    }

    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !lifecycle::accepts_donations(&campaign, now) {
        return Err(LedgerError::ConflictingStatus(format!(
            "campaign '{}' is not accepting donations",
            campaign.slug
        )));
    }

    let donor_name = input
        .donor_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_DONOR.to_string());

    let result = sqlx::query(
        r#"
        INSERT INTO donations
            (campaign_id, user_id, amount, status, donor_name, message,
             payment_method, created_at)
        VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(campaign_id)
    .bind(&input.user_id)
    .bind(input.amount)
    .bind(&donor_name)
    .bind(&input.message)
    .bind(&input.payment_method)
    .bind(now)
    .execute(pool)
    .await?;

    fetch(pool, result.last_insert_rowid()).await
}

// ─────────────────────────────────────────────────────────
// Status transitions (payment-gateway boundary)
// ─────────────────────────────────────────────────────────

/// Confirm that funds were received for a pending donation.
///
/// Idempotent: repeat delivery of the identical settled status (and fee)
/// is a no-op.  Settling a failed, expired, or differently-settled
/// donation is a [`LedgerError::ConflictingStatus`].
pub async fn mark_settled(
    pool: &SqlitePool,
    donation_id: i64,
    settled_status: DonationStatus,
    fee: i64,
    now: i64,
) -> Result<Donation> {
    if !settled_status.is_settled() {
        return Err(LedgerError::InvalidInput(format!(
            "'{}' is not a settled status",
            settled_status.as_str()
        )));
    }
    if fee < 0 {
        return Err(LedgerError::InvalidInput("fee must not be negative".into()));
    }

    let moved = sqlx::query(
        "UPDATE donations SET status = ?2, fee = ?3, settled_at = ?4 \
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(donation_id)
    .bind(settled_status)
    .bind(fee)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let donation = fetch(pool, donation_id).await?;
    if moved > 0 {
        debug!(
            "Donation {donation_id} settled as {} (fee {fee})",
            settled_status.as_str()
        );
        return Ok(donation);
    }
    // Guard missed: either a repeat of the same confirmation, or a conflict.
    if donation.status == settled_status && donation.fee == fee {
        return Ok(donation);
    }
    Err(LedgerError::ConflictingStatus(format!(
        "donation {donation_id} is already {} and cannot settle as {}",
        donation.status.as_str(),
        settled_status.as_str()
    )))
}

/// Mark a pending donation as failed.  Legal only from `pending`;
/// idempotent on repeat.
pub async fn mark_failed(pool: &SqlitePool, donation_id: i64) -> Result<Donation> {
    close_pending(pool, donation_id, DonationStatus::Failed).await
}

/// Mark a pending donation's checkout as expired.  Same discipline as
/// [`mark_failed`].
pub async fn mark_expired(pool: &SqlitePool, donation_id: i64) -> Result<Donation> {
    close_pending(pool, donation_id, DonationStatus::Expired).await
}

async fn close_pending(
    pool: &SqlitePool,
    donation_id: i64,
    target: DonationStatus,
) -> Result<Donation> {
    let moved = sqlx::query("UPDATE donations SET status = ?2 WHERE id = ?1 AND status = 'pending'")
        .bind(donation_id)
        .bind(target)
        .execute(pool)
        .await?
        .rows_affected();

    let donation = fetch(pool, donation_id).await?;
    if moved > 0 || donation.status == target {
        Ok(donation)
    } else {
        Err(LedgerError::ConflictingStatus(format!(
            "donation {donation_id} is already {} and cannot move to {}",
            donation.status.as_str(),
            target.as_str()
        )))
    }
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

pub async fn fetch(pool: &SqlitePool, donation_id: i64) -> Result<Donation> {
    sqlx::query_as::<_, Donation>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"
    ))
    .bind(donation_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("donation {donation_id} does not exist")))
}

/// Settled donations for a campaign, newest first.  This is the only
/// donation list ever shown publicly; pending and failed attempts stay
/// invisible to aggregation and to other donors.
pub async fn list_valid_for_campaign(
    pool: &SqlitePool,
    campaign_id: i64,
) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations \
         WHERE campaign_id = ?1 AND status IN ('paid', 'settled', 'completed') \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A donor's own history, including pending and failed attempts.
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations \
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
