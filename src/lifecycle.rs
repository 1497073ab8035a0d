//! Campaign lifecycle state machine.
//!
//! ## Transition table
//!
//! ```text
//! draft ──► pending ──► active ◄──► paused
//!              │           │           │
//!              ▼           ▼           ▼
//!          rejected     completed ◄────┘
//! ```
//!
//! `rejected` and `completed` are terminal: there is no un-reject and no
//! reopening of a completed campaign, not even by an admin.  A rejected
//! campaign is resubmitted as a new draft.
//!
//! Every transition executes as a single conditional UPDATE guarded on the
//! expected current status, so concurrent writers converge instead of
//! clobbering each other.  When the guard misses because the campaign is
//! already in the requested target state, the call is an idempotent no-op.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::campaigns;
use crate::errors::{LedgerError, Result};
use crate::models::{Caller, Campaign, CampaignStatus};
use crate::verify;

/// Whether the state machine permits `from → to`.
pub fn transition_allowed(from: CampaignStatus, to: CampaignStatus) -> bool {
    use CampaignStatus::*;
    matches!(
        (from, to),
        (Draft, Pending)
            | (Pending, Active)
            | (Pending, Rejected)
            | (Active, Paused)
            | (Paused, Active)
            | (Active, Completed)
            | (Paused, Completed)
    )
}

// ─────────────────────────────────────────────────────────
// Operation gates
// ─────────────────────────────────────────────────────────

/// A campaign accepts new donations only while `active` and not past its
/// end date.
pub fn accepts_donations(campaign: &Campaign, now: i64) -> bool {
    campaign.status == CampaignStatus::Active
        && campaign.end_at.map_or(true, |end| now <= end)
}

/// Withdrawal requests are allowed while `active` or `paused`.
pub fn accepts_withdrawal(campaign: &Campaign) -> bool {
    matches!(
        campaign.status,
        CampaignStatus::Active | CampaignStatus::Paused
    )
}

/// Content edits are allowed while `draft`, `pending`, or `active`.
pub fn accepts_edit(campaign: &Campaign) -> bool {
    matches!(
        campaign.status,
        CampaignStatus::Draft | CampaignStatus::Pending | CampaignStatus::Active
    )
}

// ─────────────────────────────────────────────────────────
// Lazy expiry
// ─────────────────────────────────────────────────────────

/// Complete a single campaign whose end date has passed.
///
/// Idempotent, and safe to run concurrently from any number of readers:
/// the guard only matches `active`/`paused` rows with an elapsed end date,
/// so repeat invocations (and races with an explicit finish) are no-ops.
/// Never surfaces a state error to the triggering reader.
pub async fn expire_if_due(pool: &SqlitePool, campaign_id: i64, now: i64) -> Result<bool> {
    let expired = sqlx::query(
        r#"
        UPDATE campaigns
        SET    status = 'completed', updated_at = ?2
        WHERE  id = ?1
          AND  status IN ('active', 'paused')
          AND  end_at IS NOT NULL AND end_at < ?2
        "#,
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if expired > 0 {
        debug!("Campaign {campaign_id} completed by lazy expiry");
    }
    Ok(expired > 0)
}

/// Complete every campaign past its end date.  Used by the background
/// sweeper; same statement semantics as [`expire_if_due`].
pub async fn sweep_expired(pool: &SqlitePool, now: i64) -> Result<u64> {
    let expired = sqlx::query(
        r#"
        UPDATE campaigns
        SET    status = 'completed', updated_at = ?1
        WHERE  status IN ('active', 'paused')
          AND  end_at IS NOT NULL AND end_at < ?1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(expired)
}

// ─────────────────────────────────────────────────────────
// Explicit transitions
// ─────────────────────────────────────────────────────────

/// Submit a draft for review: `draft → pending`.
///
/// Owner (or admin) only; the draft must carry the fields a reviewer needs.
pub async fn submit(pool: &SqlitePool, caller: &Caller, campaign_id: i64, now: i64) -> Result<Campaign> {
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may submit".into(),
        ));
    }
    if campaign.story.trim().is_empty() {
        return Err(LedgerError::InvalidInput(
            "a story is required before submission".into(),
        ));
    }
    if !campaign.target_amount.is_some_and(|t| t > 0) {
        return Err(LedgerError::InvalidInput(
            "a positive target amount is required before submission".into(),
        ));
    }

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'pending', updated_at = ?2 \
         WHERE id = ?1 AND status = 'draft'",
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    finish_transition(pool, campaign_id, moved, CampaignStatus::Pending).await
}

/// Activate a pending campaign: `pending → active`.
///
/// Admin only.  The verification gate must pass; on failure the itemized
/// list of failing checks is returned so the reviewer can act on each.
pub async fn approve(pool: &SqlitePool, caller: &Caller, campaign_id: i64, now: i64) -> Result<Campaign> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden("only an admin may approve".into()));
    }
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if campaign.status == CampaignStatus::Active {
        return Ok(campaign);
    }
    let failing = verify::failing_checks(&campaign);
    if !failing.is_empty() {
        return Err(LedgerError::IncompleteVerification(failing));
    }

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'active', verified_at = ?2, updated_at = ?2 \
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if moved > 0 {
        info!("Campaign {campaign_id} verified and activated by {}", caller.user_id);
    }
    finish_transition(pool, campaign_id, moved, CampaignStatus::Active).await
}

/// Reject a pending campaign: `pending → rejected`.  Admin only; terminal.
pub async fn reject(
    pool: &SqlitePool,
    caller: &Caller,
    campaign_id: i64,
    reason: Option<String>,
    now: i64,
) -> Result<Campaign> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden("only an admin may reject".into()));
    }
    campaigns::fetch(pool, campaign_id).await?;

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'rejected', rejected_reason = ?2, updated_at = ?3 \
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(campaign_id)
    .bind(&reason)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    finish_transition(pool, campaign_id, moved, CampaignStatus::Rejected).await
}

/// Pause an active campaign: `active → paused`.  Donations are blocked
/// while paused.
pub async fn pause(pool: &SqlitePool, caller: &Caller, campaign_id: i64, now: i64) -> Result<Campaign> {
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may pause".into(),
        ));
    }

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'paused', updated_at = ?2 \
         WHERE id = ?1 AND status = 'active'",
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    finish_transition(pool, campaign_id, moved, CampaignStatus::Paused).await
}

/// Resume a paused campaign: `paused → active`.
pub async fn resume(pool: &SqlitePool, caller: &Caller, campaign_id: i64, now: i64) -> Result<Campaign> {
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may resume".into(),
        ));
    }

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'active', updated_at = ?2 \
         WHERE id = ?1 AND status = 'paused'",
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    finish_transition(pool, campaign_id, moved, CampaignStatus::Active).await
}

/// Explicitly end a campaign: `active|paused → completed`.
///
/// Converges with the time-based expiry: finishing an already completed
/// campaign is an idempotent no-op.
pub async fn finish(pool: &SqlitePool, caller: &Caller, campaign_id: i64, now: i64) -> Result<Campaign> {
    let campaign = campaigns::get(pool, campaign_id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may finish".into(),
        ));
    }

    let moved = sqlx::query(
        "UPDATE campaigns SET status = 'completed', updated_at = ?2 \
         WHERE id = ?1 AND status IN ('active', 'paused')",
    )
    .bind(campaign_id)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    finish_transition(pool, campaign_id, moved, CampaignStatus::Completed).await
}

/// Classify the outcome of a guarded transition.
///
/// A guard miss is an idempotent success when the campaign already sits in
/// the requested target state, and a [`LedgerError::ConflictingStatus`]
/// otherwise.
async fn finish_transition(
    pool: &SqlitePool,
    campaign_id: i64,
    rows_moved: u64,
    target: CampaignStatus,
) -> Result<Campaign> {
    let campaign = campaigns::fetch(pool, campaign_id).await?;
    if rows_moved > 0 || campaign.status == target {
        Ok(campaign)
    } else {
        Err(LedgerError::ConflictingStatus(format!(
            "campaign is {} and cannot move to {}",
            campaign.status.as_str(),
            target.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CampaignStatus::*;

    fn campaign_with(status: CampaignStatus, end_at: Option<i64>) -> Campaign {
        Campaign {
            id: 1,
            slug: "s".into(),
            title: "t".into(),
            category: None,
            story: String::new(),
            target_amount: Some(1_000),
            start_at: 0,
            end_at,
            status,
            created_by: "alice".into(),
            verified_at: None,
            rejected_reason: None,
            cover_image_url: None,
            identity_document_url: None,
            contact_phone: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for to in [Draft, Pending, Active, Paused, Rejected, Completed] {
            assert!(!transition_allowed(Completed, to), "completed -> {to:?}");
            assert!(!transition_allowed(Rejected, to), "rejected -> {to:?}");
        }
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(transition_allowed(Draft, Pending));
        assert!(transition_allowed(Pending, Active));
        assert!(transition_allowed(Pending, Rejected));
        assert!(transition_allowed(Active, Paused));
        assert!(transition_allowed(Paused, Active));
        assert!(transition_allowed(Active, Completed));
        assert!(transition_allowed(Paused, Completed));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!transition_allowed(Pending, Draft));
        assert!(!transition_allowed(Active, Pending));
        assert!(!transition_allowed(Rejected, Active));
        assert!(!transition_allowed(Draft, Active));
    }

    #[test]
    fn donations_only_accepted_while_active_and_before_end() {
        let now = 1_000;
        assert!(accepts_donations(&campaign_with(Active, None), now));
        assert!(accepts_donations(&campaign_with(Active, Some(now)), now));
        assert!(!accepts_donations(&campaign_with(Active, Some(now - 1)), now));
        assert!(!accepts_donations(&campaign_with(Paused, None), now));
        assert!(!accepts_donations(&campaign_with(Completed, None), now));
    }

    #[test]
    fn withdrawal_gate_covers_active_and_paused_only() {
        assert!(accepts_withdrawal(&campaign_with(Active, None)));
        assert!(accepts_withdrawal(&campaign_with(Paused, None)));
        assert!(!accepts_withdrawal(&campaign_with(Completed, None)));
        assert!(!accepts_withdrawal(&campaign_with(Draft, None)));
        assert!(!accepts_withdrawal(&campaign_with(Rejected, None)));
    }

    #[test]
    fn edit_gate_excludes_ended_and_rejected() {
        assert!(accepts_edit(&campaign_with(Draft, None)));
        assert!(accepts_edit(&campaign_with(Pending, None)));
        assert!(accepts_edit(&campaign_with(Active, None)));
        assert!(!accepts_edit(&campaign_with(Paused, None)));
        assert!(!accepts_edit(&campaign_with(Rejected, None)));
        assert!(!accepts_edit(&campaign_with(Completed, None)));
    }
}
