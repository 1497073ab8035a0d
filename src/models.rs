//! Canonical domain types: campaigns, donations, withdrawals, and the
//! caller identity supplied by the (out-of-scope) auth collaborator.
//!
//! ## Status enums
//!
//! All statuses are stored as canonical lowercase strings.  The payment
//! gateway historically reported mixed-case status strings; those are
//! normalised once at the parse boundary ([`DonationStatus::parse_gateway`])
//! and never stored verbatim.

use serde::{Deserialize, Serialize};

/// Current unix timestamp in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ─────────────────────────────────────────────────────────
// Campaign
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a campaign.
///
/// ```text
/// draft ──► pending ──► active ◄──► paused
///              │           │           │
///              ▼           └──► completed ◄┘
///          rejected
/// ```
///
/// `rejected` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Pending,
    Active,
    Paused,
    Rejected,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

/// A campaign row as stored in / read from the database.
///
/// No financial aggregates live here: collected amount, donor count, and
/// days-left are always recomputed from donations (see `aggregate.rs`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub category: Option<String>,
    pub story: String,
    /// Target amount in minor units; `None` = unlimited ("quick donation").
    pub target_amount: Option<i64>,
    pub start_at: i64,
    /// `None` = unlimited duration.
    pub end_at: Option<i64>,
    pub status: CampaignStatus,
    pub created_by: String,
    pub verified_at: Option<i64>,
    pub rejected_reason: Option<String>,
    pub cover_image_url: Option<String>,
    pub identity_document_url: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ─────────────────────────────────────────────────────────
// Donation
// ─────────────────────────────────────────────────────────

/// Payment-gateway-reported state of a donation, normalised.
///
/// Only the settled set (`paid`, `settled`, `completed`) counts toward a
/// campaign's collected total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Paid,
    Settled,
    Completed,
    Failed,
    Expired,
}

impl DonationStatus {
    /// `true` when funds have been received for this donation.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Settled | Self::Completed)
    }

    /// `true` for the terminal non-settled states.
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Settled => "settled",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Normalise a raw gateway status string.  The gateway reports mixed
    /// case ("PAID", "paid", "Settled"); unknown strings are rejected.
    pub fn parse_gateway(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "settled" => Some(Self::Settled),
            "completed" | "capture" => Some(Self::Completed),
            "failed" | "deny" | "cancel" => Some(Self::Failed),
            "expired" | "expire" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A donation row as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donation {
    pub id: i64,
    pub campaign_id: i64,
    /// `None` = anonymous donor.
    pub user_id: Option<String>,
    /// Amount in minor units; immutable once created.
    pub amount: i64,
    /// Platform/gateway fee, reporting only; never subtracted from `amount`.
    pub fee: i64,
    pub status: DonationStatus,
    pub donor_name: String,
    pub message: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: i64,
    pub settled_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────
// Withdrawal
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

/// A withdrawal row as stored in / read from the database.
///
/// Only `completed` withdrawals count against a campaign's disbursed total.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub campaign_id: i64,
    pub amount: i64,
    pub bank_name: String,
    pub bank_account: String,
    pub account_holder: String,
    pub proof_url: Option<String>,
    pub notes: Option<String>,
    pub status: WithdrawalStatus,
    pub requested_by: String,
    pub rejected_reason: Option<String>,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────
// Caller identity
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Identity of the acting user, supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Caller { user_id: id.into(), role: Role::User }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Caller { user_id: id.into(), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner-or-admin check used by edit, pause, and withdrawal rights.
    pub fn may_act_on(&self, campaign: &Campaign) -> bool {
        self.is_admin() || self.user_id == campaign.created_by
    }
}
