//! Verification gate — the checklist a pending campaign must satisfy
//! before it may go active.
//!
//! Each check is derived from campaign state on demand; nothing here is
//! stored independently.  The gate only tests presence/shape of evidence
//! (URLs, phone number), never content — media validation belongs to the
//! upload collaborator.

use serde::Serialize;

use crate::models::Campaign;

/// Minimum story length (characters) required for activation.
pub const MIN_STORY_LEN: usize = 80;

/// A single verification checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    IdentityDocument,
    CoverImage,
    StoryLength,
    TargetAmount,
    Category,
    ContactPhone,
}

impl Check {
    pub const ALL: [Check; 6] = [
        Check::IdentityDocument,
        Check::CoverImage,
        Check::StoryLength,
        Check::TargetAmount,
        Check::Category,
        Check::ContactPhone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityDocument => "identity_document",
            Self::CoverImage => "cover_image",
            Self::StoryLength => "story_length",
            Self::TargetAmount => "target_amount",
            Self::Category => "category",
            Self::ContactPhone => "contact_phone",
        }
    }

    /// Human-readable remediation hint surfaced to the reviewer.
    pub fn description(&self) -> &'static str {
        match self {
            Self::IdentityDocument => "identity document must be uploaded",
            Self::CoverImage => "cover image must be uploaded",
            Self::StoryLength => "story must be at least 80 characters",
            Self::TargetAmount => "target amount must be positive",
            Self::Category => "a category must be assigned",
            Self::ContactPhone => "a contact phone number is required",
        }
    }

    /// Evaluate this check against a campaign.
    pub fn passes(&self, campaign: &Campaign) -> bool {
        match self {
            Self::IdentityDocument => non_empty(&campaign.identity_document_url),
            Self::CoverImage => non_empty(&campaign.cover_image_url),
            Self::StoryLength => campaign.story.chars().count() >= MIN_STORY_LEN,
            Self::TargetAmount => campaign.target_amount.is_some_and(|t| t > 0),
            Self::Category => non_empty(&campaign.category),
            Self::ContactPhone => non_empty(&campaign.contact_phone),
        }
    }
}

fn non_empty(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Itemized list of failing checks; empty means the gate passes.
pub fn failing_checks(campaign: &Campaign) -> Vec<Check> {
    Check::ALL
        .into_iter()
        .filter(|c| !c.passes(campaign))
        .collect()
}

/// Per-item pass/fail view for the reviewer-facing checklist endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistEntry {
    pub check: Check,
    pub passed: bool,
    pub description: &'static str,
}

pub fn checklist(campaign: &Campaign) -> Vec<ChecklistEntry> {
    Check::ALL
        .into_iter()
        .map(|check| ChecklistEntry {
            check,
            passed: check.passes(campaign),
            description: check.description(),
        })
        .collect()
}
