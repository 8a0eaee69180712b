//! Error types for command processing.

use thiserror::Error;

use crate::Points;
use crate::auth::ActorId;
use crate::ledger::LedgerError;
use crate::model::{
    LiftId, LiftStatus, MasonId, OrgId, RedemptionId, RedemptionStatus, RewardId, SubmissionId,
};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("redemption placement failed: {0}")]
    Placement(#[from] PlacementError),

    #[error("bag-lift decision failed: {0}")]
    Lift(#[from] LiftError),

    #[error("redemption update failed: {0}")]
    Redemption(#[from] RedemptionError),

    #[error("kyc decision failed: {0}")]
    Kyc(#[from] KycError),
}

/// Error while seeding masons, rewards, lifts, or KYC submissions.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("mason {0} already registered")]
    DuplicateMason(MasonId),
    #[error("reward {0} already registered")]
    DuplicateReward(RewardId),
    #[error("lift {0} already submitted")]
    DuplicateLift(LiftId),
    #[error("kyc submission {0} already filed")]
    DuplicateSubmission(SubmissionId),
    #[error("mason {0} not found")]
    MasonNotFound(MasonId),
    #[error("referrer {0} is not a registered mason")]
    ReferrerNotFound(MasonId),
    #[error("a lift must contain at least one bag")]
    EmptyLift,
}

/// Error while placing a redemption order.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("redemption {0} already placed")]
    DuplicateRedemption(RedemptionId),
    #[error("mason {0} not found")]
    MasonNotFound(MasonId),
    #[error("reward {0} not found")]
    RewardNotFound(RewardId),
    #[error("a redemption must request at least one unit")]
    EmptyOrder,
    #[error("mason {mason} has {balance} points, needs {required}")]
    InsufficientPoints {
        mason: MasonId,
        balance: Points,
        required: Points,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Error while deciding a bag lift.
#[derive(Debug, Error)]
pub enum LiftError {
    #[error("lift {0} not found")]
    NotFound(LiftId),
    #[error("mason {0} not found")]
    MasonNotFound(MasonId),
    #[error("actor {actor} may not administer masons of org {org}")]
    Forbidden { actor: ActorId, org: OrgId },
    #[error("lift {0} is already {1:?}")]
    NoOp(LiftId, LiftStatus),
    #[error("lift {0} was rejected and cannot be approved")]
    RejectedIsFinal(LiftId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Error while updating a redemption's status.
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("redemption {0} not found")]
    NotFound(RedemptionId),
    #[error("mason {0} not found")]
    MasonNotFound(MasonId),
    #[error("reward {0} not found")]
    RewardNotFound(RewardId),
    #[error("actor {actor} may not administer masons of org {org}")]
    Forbidden { actor: ActorId, org: OrgId },
    #[error("redemption {0} is already {1:?}")]
    NoOp(RedemptionId, RedemptionStatus),
    #[error("redemption {0} was delivered and can no longer change")]
    Terminal(RedemptionId),
    #[error("redemption {redemption} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        redemption: RedemptionId,
        from: RedemptionStatus,
        to: RedemptionStatus,
    },
    #[error("insufficient stock for {name}: {stock} left, {requested} requested")]
    InsufficientStock {
        name: String,
        stock: u32,
        requested: u32,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Error while recording a KYC outcome.
#[derive(Debug, Error)]
pub enum KycError {
    #[error("mason {0} not found")]
    NotFound(MasonId),
    #[error("actor {actor} may not administer masons of org {org}")]
    Forbidden { actor: ActorId, org: OrgId },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
