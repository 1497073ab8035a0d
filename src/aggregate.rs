//! Ledger aggregator — the authoritative financial view of a campaign.
//!
//! Nothing here is cached or stored: collected amount, donor count, fees,
//! and disbursed totals are recomputed from the donation and withdrawal
//! sets on every call.  The whole read happens in ONE SQL statement, so the
//! figures always reflect a single consistent snapshot even under
//! concurrent writes.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::Result;
use crate::models::Campaign;

const SECS_PER_DAY: i64 = 86_400;

/// Raw totals read in a single snapshot.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub(crate) struct Totals {
    pub collected: i64,
    pub donor_count: i64,
    pub total_fees: i64,
    pub disbursed: i64,
}

impl Totals {
    /// Fee-exclusive balance still available for disbursement.
    pub fn available(&self) -> i64 {
        self.collected - self.total_fees - self.disbursed
    }
}

/// One consistent read of both ledgers for a campaign.
pub(crate) async fn totals(pool: &SqlitePool, campaign_id: i64) -> Result<Totals> {
    let totals = sqlx::query_as::<_, Totals>(
        r#"
        SELECT
            COALESCE((SELECT SUM(amount) FROM donations
                      WHERE campaign_id = ?1
                        AND status IN ('paid', 'settled', 'completed')), 0) AS collected,
            (SELECT COUNT(*) FROM donations
             WHERE campaign_id = ?1
               AND status IN ('paid', 'settled', 'completed'))               AS donor_count,
            COALESCE((SELECT SUM(fee) FROM donations
                      WHERE campaign_id = ?1
                        AND status IN ('paid', 'settled', 'completed')), 0)  AS total_fees,
            COALESCE((SELECT SUM(amount) FROM withdrawals
                      WHERE campaign_id = ?1 AND status = 'completed'), 0)   AS disbursed
        "#,
    )
    .bind(campaign_id)
    .fetch_one(pool)
    .await?;
    Ok(totals)
}

/// Financial summary exposed to reporting callers.
///
/// `collected` is the raw fee-exclusive figure donors see; `remaining` is
/// the fee-inclusive balance still available for disbursement
/// (`collected − total_fees − disbursed`).  Callers must not conflate the
/// two.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub campaign_id: i64,
    /// Sum of settled donation amounts.
    pub collected: i64,
    /// Number of settled donations (not distinct donors).
    pub donor_count: i64,
    pub total_fees: i64,
    /// Sum of completed withdrawal amounts.
    pub disbursed: i64,
    /// `collected − total_fees − disbursed`.
    pub remaining: i64,
    /// Rounded, clamped to 0..=100; `None` when the campaign has no target.
    pub progress_pct: Option<u8>,
    /// Whole days until the end date, floored at 0; `None` = unlimited.
    pub days_left: Option<i64>,
}

/// Compute the full summary for a campaign.
pub async fn summary(pool: &SqlitePool, campaign: &Campaign, now: i64) -> Result<CampaignSummary> {
    let totals = totals(pool, campaign.id).await?;
    Ok(CampaignSummary {
        campaign_id: campaign.id,
        collected: totals.collected,
        donor_count: totals.donor_count,
        total_fees: totals.total_fees,
        disbursed: totals.disbursed,
        remaining: totals.available(),
        progress_pct: progress_pct(totals.collected, campaign.target_amount),
        days_left: days_left(campaign.end_at, now),
    })
}

/// Funding progress as a rounded percentage, clamped to 0..=100.
///
/// Undefined (`None`) for campaigns without a positive target.
pub fn progress_pct(collected: i64, target: Option<i64>) -> Option<u8> {
    let target = target.filter(|t| *t > 0)?;
    let pct = (collected.max(0) as i128 * 100 + target as i128 / 2) / target as i128;
    Some(pct.clamp(0, 100) as u8)
}

/// Whole days until `end_at`, rounded up and floored at 0.
///
/// `None` means the campaign runs indefinitely — a sentinel, never zero.
pub fn days_left(end_at: Option<i64>, now: i64) -> Option<i64> {
    end_at.map(|end| ((end - now) + SECS_PER_DAY - 1).div_euclid(SECS_PER_DAY).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_rounded_and_clamped() {
        assert_eq!(progress_pct(200_000, Some(1_000_000)), Some(20));
        assert_eq!(progress_pct(0, Some(1_000_000)), Some(0));
        assert_eq!(progress_pct(2_000_000, Some(1_000_000)), Some(100));
        assert_eq!(progress_pct(333, Some(1_000)), Some(33));
        assert_eq!(progress_pct(335, Some(1_000)), Some(34));
    }

    #[test]
    fn progress_is_undefined_without_a_target() {
        assert_eq!(progress_pct(500, None), None);
        assert_eq!(progress_pct(500, Some(0)), None);
    }

    #[test]
    fn days_left_rounds_up_and_floors_at_zero() {
        let now = 1_000_000;
        assert_eq!(days_left(Some(now + SECS_PER_DAY), now), Some(1));
        assert_eq!(days_left(Some(now + SECS_PER_DAY + 1), now), Some(2));
        assert_eq!(days_left(Some(now + 1), now), Some(1));
        assert_eq!(days_left(Some(now), now), Some(0));
        assert_eq!(days_left(Some(now - SECS_PER_DAY), now), Some(0));
    }

    #[test]
    fn unlimited_campaigns_report_no_days_left() {
        assert_eq!(days_left(None, 0), None);
    }

    #[test]
    fn available_subtracts_fees_and_disbursed() {
        let totals = Totals {
            collected: 200_000,
            donor_count: 1,
            total_fees: 5_000,
            disbursed: 150_000,
        };
        assert_eq!(totals.available(), 45_000);
    }
}
