//! Campaign store — creation, reads (with lazy expiry), edits, deletion,
//! and the singleton quick-donation bootstrap.
//!
//! Reads go through [`get`] / [`get_by_slug`], which first apply the lazy
//! expiry transition (see `lifecycle.rs`) so no caller ever observes an
//! `active` campaign whose end date has passed.

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{LedgerError, Result};
use crate::lifecycle;
use crate::models::{Caller, Campaign};

const CAMPAIGN_COLUMNS: &str = "id, slug, title, category, story, target_amount, start_at, end_at, \
     status, created_by, verified_at, rejected_reason, cover_image_url, \
     identity_document_url, contact_phone, created_at, updated_at";

// ─────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub slug: String,
    pub title: String,
    pub category: Option<String>,
    #[serde(default)]
    pub story: String,
    /// Minor units; `None` = unlimited target.
    pub target_amount: Option<i64>,
    /// Defaults to creation time.
    pub start_at: Option<i64>,
    /// `None` = unlimited duration.
    pub end_at: Option<i64>,
    pub cover_image_url: Option<String>,
    pub identity_document_url: Option<String>,
    pub contact_phone: Option<String>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub story: Option<String>,
    pub target_amount: Option<i64>,
    pub end_at: Option<i64>,
    pub cover_image_url: Option<String>,
    pub identity_document_url: Option<String>,
    pub contact_phone: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────

/// Create a new campaign in `draft` status, owned by the caller.
pub async fn create_draft(
    pool: &SqlitePool,
    caller: &Caller,
    input: NewCampaign,
    now: i64,
) -> Result<Campaign> {
    validate_slug(&input.slug)?;
    if input.title.trim().is_empty() {
        return Err(LedgerError::InvalidInput("title must not be empty".into()));
    }
    if let Some(target) = input.target_amount {
        if target <= 0 {
            return Err(LedgerError::InvalidInput(
                "target amount must be positive".into(),
            ));
        }
    }
    let start_at = input.start_at.unwrap_or(now);
    if let Some(end_at) = input.end_at {
        if end_at < start_at {
            return Err(LedgerError::InvalidInput(
                "end date must not precede start date".into(),
            ));
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO campaigns
            (slug, title, category, story, target_amount, start_at, end_at,
             status, created_by, cover_image_url, identity_document_url,
             contact_phone, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'draft', ?8, ?9, ?10, ?11, ?12, ?12)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.category)
    .bind(&input.story)
    .bind(input.target_amount)
    .bind(start_at)
    .bind(input.end_at)
    .bind(&caller.user_id)
    .bind(&input.cover_image_url)
    .bind(&input.identity_document_url)
    .bind(&input.contact_phone)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LedgerError::InvalidInput(format!("slug '{}' is already in use", input.slug))
        }
        _ => LedgerError::Database(e),
    })?;

    fetch(pool, result.last_insert_rowid()).await
}

/// Create-if-absent bootstrap for the singleton quick-donation campaign.
///
/// Runs at service start.  The unique constraint on `slug` plus
/// `ON CONFLICT DO NOTHING` makes concurrent first access from several
/// instances converge on a single row.
pub async fn ensure_quick_donation(pool: &SqlitePool, slug: &str, now: i64) -> Result<Campaign> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO campaigns
            (slug, title, story, target_amount, start_at, end_at,
             status, created_by, created_at, updated_at)
        VALUES (?1, 'Quick Donation', 'Undirected donations.', NULL, ?2, NULL,
                'active', 'system', ?2, ?2)
        ON CONFLICT (slug) DO NOTHING
        "#,
    )
    .bind(slug)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!("Quick-donation campaign '{slug}' created");
    }
    get_by_slug(pool, slug, now).await
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

/// Fetch a campaign by id without applying lazy expiry.
///
/// Building block for the transition functions; readers that care about
/// the end date should use [`get`].
pub async fn fetch(pool: &SqlitePool, id: i64) -> Result<Campaign> {
    sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("campaign {id} does not exist")))
}

/// Fetch a campaign by id, applying the lazy expiry transition first.
pub async fn get(pool: &SqlitePool, id: i64, now: i64) -> Result<Campaign> {
    lifecycle::expire_if_due(pool, id, now).await?;
    fetch(pool, id).await
}

/// Fetch a campaign by slug, applying the lazy expiry transition first.
pub async fn get_by_slug(pool: &SqlitePool, slug: &str, now: i64) -> Result<Campaign> {
    let campaign = sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE slug = ?1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("campaign '{slug}' does not exist")))?;

    lifecycle::expire_if_due(pool, campaign.id, now).await?;
    fetch(pool, campaign.id).await
}

/// All campaigns, newest first.  Runs the set-wide expiry sweep first, so
/// the listing never reports a stale `active` status for a campaign whose
/// end date has passed.
pub async fn list(pool: &SqlitePool, now: i64) -> Result<Vec<Campaign>> {
    lifecycle::sweep_expired(pool, now).await?;
    let rows = sqlx::query_as::<_, Campaign>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────

/// Edit campaign content.  Allowed for the owner or an admin while the
/// campaign is in `draft`, `pending`, or `active`.
pub async fn update(
    pool: &SqlitePool,
    caller: &Caller,
    id: i64,
    patch: CampaignUpdate,
    now: i64,
) -> Result<Campaign> {
    let campaign = get(pool, id, now).await?;
    if !caller.may_act_on(&campaign) {
        return Err(LedgerError::Forbidden(
            "only the campaign owner or an admin may edit".into(),
        ));
    }
    if !lifecycle::accepts_edit(&campaign) {
        return Err(LedgerError::ConflictingStatus(format!(
            "campaign is {} and can no longer be edited",
            campaign.status.as_str()
        )));
    }

    if let Some(target) = patch.target_amount {
        if target <= 0 {
            return Err(LedgerError::InvalidInput(
                "target amount must be positive".into(),
            ));
        }
    }
    if let Some(end_at) = patch.end_at {
        if end_at < campaign.start_at {
            return Err(LedgerError::InvalidInput(
                "end date must not precede start date".into(),
            ));
        }
    }

    let title = patch.title.unwrap_or(campaign.title);
    if title.trim().is_empty() {
        return Err(LedgerError::InvalidInput("title must not be empty".into()));
    }

    // Guarded on the editable statuses so a concurrent finish/reject wins.
    let updated = sqlx::query(
        r#"
        UPDATE campaigns
        SET    title = ?2, category = ?3, story = ?4, target_amount = ?5,
               end_at = ?6, cover_image_url = ?7, identity_document_url = ?8,
               contact_phone = ?9, updated_at = ?10
        WHERE  id = ?1 AND status IN ('draft', 'pending', 'active')
        "#,
    )
    .bind(id)
    .bind(&title)
    .bind(patch.category.or(campaign.category))
    .bind(patch.story.unwrap_or(campaign.story))
    .bind(patch.target_amount.or(campaign.target_amount))
    .bind(patch.end_at.or(campaign.end_at))
    .bind(patch.cover_image_url.or(campaign.cover_image_url))
    .bind(patch.identity_document_url.or(campaign.identity_document_url))
    .bind(patch.contact_phone.or(campaign.contact_phone))
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(LedgerError::ConflictingStatus(
            "campaign left its editable state concurrently".into(),
        ));
    }
    fetch(pool, id).await
}

/// Delete a campaign and, via FK cascade, all of its donations and
/// withdrawals.  Admin only.
pub async fn delete(pool: &SqlitePool, caller: &Caller, id: i64) -> Result<()> {
    if !caller.is_admin() {
        return Err(LedgerError::Forbidden(
            "only an admin may delete a campaign".into(),
        ));
    }
    let deleted = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(LedgerError::NotFound(format!("campaign {id} does not exist")));
    }
    info!("Campaign {id} deleted by {}", caller.user_id);
    Ok(())
}

fn validate_slug(slug: &str) -> Result<()> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidInput(format!(
            "slug '{slug}' must be non-empty and URL-safe"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation_rejects_unsafe_characters() {
        assert!(validate_slug("clean-water-2026").is_ok());
        assert!(validate_slug("bantu_sekolah").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("päth").is_err());
    }
}
