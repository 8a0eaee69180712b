//! Core domain types for the loyalty engine.

use jiff::{Timestamp, civil::Date};

use crate::Points;
use crate::auth::Actor;

/// Mason (petty contractor) identifier.
pub type MasonId = u32;

/// Bag-lift submission identifier.
pub type LiftId = u32;

/// Reward catalog item identifier.
pub type RewardId = u32;

/// Reward redemption identifier.
pub type RedemptionId = u32;

/// KYC submission identifier.
pub type SubmissionId = u32;

/// Dealer identifier.
pub type DealerId = u32;

/// Construction-site identifier.
pub type SiteId = u32;

/// Application-user identifier.
pub type UserId = u32;

/// Organization (tenant) identifier.
pub type OrgId = u32;

/// A command representing the possible inputs of the engine.
///
/// Seed commands create records the way the mason-facing side of the
/// program does; decision commands are the administrative actions that
/// drive the approval, redemption, and KYC state machines.
#[derive(Debug, Clone)]
pub enum Command {
    /// Enroll a mason with a zero balance.
    RegisterMason {
        mason: MasonId,
        org: OrgId,
        referred_by: Option<MasonId>,
    },
    /// Register a reward catalog item.
    AddReward {
        reward: RewardId,
        name: String,
        stock: u32,
        cost: Points,
    },
    /// Record a bag purchase awaiting approval.
    SubmitBagLift {
        lift: LiftId,
        mason: MasonId,
        dealer: Option<DealerId>,
        bags: u32,
        purchase_date: Date,
    },
    /// File a KYC submission for verification.
    SubmitKyc {
        submission: SubmissionId,
        mason: MasonId,
    },
    /// Place a redemption order; debits points immediately.
    PlaceRedemption {
        redemption: RedemptionId,
        mason: MasonId,
        reward: RewardId,
        quantity: u32,
    },
    /// Approve or reject a pending bag lift.
    DecideBagLift {
        actor: Actor,
        lift: LiftId,
        decision: LiftDecision,
        memo: Option<String>,
    },
    /// Move a redemption through its fulfillment states.
    UpdateRedemption {
        actor: Actor,
        redemption: RedemptionId,
        status: RedemptionStatus,
        notes: Option<String>,
    },
    /// Record a KYC verification outcome for a mason, optionally applying
    /// the admin's account edits in the same unit.
    DecideKyc {
        actor: Actor,
        mason: MasonId,
        outcome: KycOutcome,
        remarks: Option<String>,
        edits: AccountEdits,
    },
}

/// Account fields an admin may set while reviewing KYC.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountEdits {
    pub user: Option<UserId>,
    pub dealer: Option<DealerId>,
    pub site: Option<SiteId>,
    pub clear_device: bool,
}

/// Administrative decision on a pending bag lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftDecision {
    Approved,
    Rejected,
}

/// State of a bag-lift submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiftStatus {
    /// Awaiting an administrative decision.
    #[default]
    Pending,
    /// Points credited; may still be reversed by rejection.
    Approved,
    /// Rejected; cannot be re-approved.
    Rejected,
}

/// A bag purchase submitted for point crediting.
#[derive(Debug, Clone)]
pub struct BagLift {
    pub mason: MasonId,
    pub dealer: Option<DealerId>,
    pub purchase_date: Date,
    pub bags: u32,
    /// Base credit, fixed at submission time.
    pub points_credited: Points,
    pub status: LiftStatus,
    pub approved_by: Option<Actor>,
    pub approved_at: Option<Timestamp>,
}

/// State of a reward redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionStatus {
    /// Points debited, stock not yet reserved.
    Placed,
    /// Stock reserved.
    Approved,
    Shipped,
    /// Terminal; no further transition permitted.
    Delivered,
    /// Points refunded; stock restored if it had been reserved.
    Rejected,
}

impl RedemptionStatus {
    /// Whether stock is reserved while a redemption sits in this state.
    pub fn holds_stock(self) -> bool {
        matches!(self, RedemptionStatus::Approved | RedemptionStatus::Shipped)
    }
}

/// A redemption order against the reward catalog.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub mason: MasonId,
    pub reward: RewardId,
    pub quantity: u32,
    /// Debit taken at placement time, refunded on rejection.
    pub points_debited: Points,
    pub status: RedemptionStatus,
    pub notes: Option<String>,
}

/// A reward catalog item.
#[derive(Debug, Clone)]
pub struct Reward {
    pub name: String,
    pub stock: u32,
    /// Point cost per unit.
    pub cost: Points,
}

/// KYC verification state of a mason account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KycStatus {
    #[default]
    None,
    Pending,
    Verified,
    Rejected,
}

/// Outcome of an administrative KYC review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycOutcome {
    Verified,
    Rejected,
}

/// State of a single KYC submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

/// One KYC filing by a mason.
#[derive(Debug, Clone)]
pub struct KycSubmission {
    pub mason: MasonId,
    pub status: SubmissionStatus,
    /// Creation order; the newest pending submission is the actionable one.
    pub seq: u64,
    pub remark: Option<String>,
}
