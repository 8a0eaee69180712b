//! Loyalty command engine.
//!
//! The engine owns the points ledger, the mason accounts, and the three
//! administrative state machines: bag-lift approval, reward redemption,
//! and KYC verification. Also supports an async stream of commands.
//!
//! Every command is applied as one indivisible unit. Preconditions
//! (existence, authorization, status, stock, balance) are checked before
//! any write, and the single fallible write of a command — a ledger append
//! carrying a source id — is issued before any other mutation, so a failed
//! command leaves zero observable side effects.

use std::collections::HashMap;

use jiff::{Timestamp, civil::Date};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Points;
use crate::auth::{Actor, Authorizer, RoleGate};
use crate::bonus::BonusRules;
use crate::ledger::{EntrySource, Ledger};
use crate::model::{
    AccountEdits, BagLift, Command, DealerId, KycOutcome, KycStatus, KycSubmission, LiftDecision,
    LiftId, LiftStatus, MasonId, OrgId, Redemption, RedemptionId, RedemptionStatus, Reward,
    RewardId, SubmissionId, SubmissionStatus,
};

mod account;
pub use account::MasonAccount;

mod error;
pub use error::{
    EngineError, KycError, LiftError, PlacementError, RedemptionError, RegistrationError,
};

/// The loyalty command engine.
///
/// Maintains mason accounts, the points ledger, and the records the three
/// state machines operate on.
pub struct Engine {
    rules: BonusRules,
    authorizer: Box<dyn Authorizer>,
    ledger: Ledger,
    masons: HashMap<MasonId, MasonAccount>,
    lifts: HashMap<LiftId, BagLift>,
    rewards: HashMap<RewardId, Reward>,
    redemptions: HashMap<RedemptionId, Redemption>,
    submissions: HashMap<SubmissionId, KycSubmission>,
    next_seq: u64,
}

/// One balance/counter discrepancy found by [`Engine::audit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub mason: MasonId,
    /// Cached balance on the account.
    pub points: Points,
    /// Balance recomputed from the ledger.
    pub ledger_points: Points,
    /// Cached bag counter on the account.
    pub bags: u32,
    /// Bag total recomputed from approved lifts.
    pub approved_bags: u32,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self::with_rules(BonusRules::default())
    }

    pub fn with_rules(rules: BonusRules) -> Self {
        Self::with_authorizer(rules, RoleGate)
    }

    pub fn with_authorizer(rules: BonusRules, authorizer: impl Authorizer + 'static) -> Self {
        Self {
            rules,
            authorizer: Box::new(authorizer),
            ledger: Ledger::new(),
            masons: HashMap::new(),
            lifts: HashMap::new(),
            rewards: HashMap::new(),
            redemptions: HashMap::new(),
            submissions: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Run the engine over the given command stream.
    ///
    /// A rejected command must not stop the run; the reason is logged and
    /// the stream continues.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(cmd) = stream.next().await {
            let _ = self.apply(cmd);
        }
    }

    /// Apply a single command on top of the current engine state.
    pub fn apply(&mut self, cmd: Command) -> Result<(), EngineError> {
        match cmd {
            Command::RegisterMason {
                mason,
                org,
                referred_by,
            } => {
                let result = self.register_mason(mason, org, referred_by);
                Self::log_result("register_mason", mason, &result);
                result?;
            }
            Command::AddReward {
                reward,
                name,
                stock,
                cost,
            } => {
                let result = self.add_reward(reward, name, stock, cost);
                Self::log_result("add_reward", reward, &result);
                result?;
            }
            Command::SubmitBagLift {
                lift,
                mason,
                dealer,
                bags,
                purchase_date,
            } => {
                let result = self.submit_bag_lift(lift, mason, dealer, bags, purchase_date);
                Self::log_result("submit_bag_lift", lift, &result);
                result?;
            }
            Command::SubmitKyc { submission, mason } => {
                let result = self.submit_kyc(submission, mason);
                Self::log_result("submit_kyc", submission, &result);
                result?;
            }
            Command::PlaceRedemption {
                redemption,
                mason,
                reward,
                quantity,
            } => {
                let result = self.place_redemption(redemption, mason, reward, quantity);
                Self::log_result("place_redemption", redemption, &result);
                result?;
            }
            Command::DecideBagLift {
                actor,
                lift,
                decision,
                memo,
            } => {
                let result = self.decide_lift(actor, lift, decision, memo);
                Self::log_result("decide_bag_lift", lift, &result);
                result?;
            }
            Command::UpdateRedemption {
                actor,
                redemption,
                status,
                notes,
            } => {
                let result = self.update_redemption(actor, redemption, status, notes);
                Self::log_result("update_redemption", redemption, &result);
                result?;
            }
            Command::DecideKyc {
                actor,
                mason,
                outcome,
                remarks,
                edits,
            } => {
                let result = self.decide_kyc(actor, mason, outcome, remarks, edits);
                Self::log_result("decide_kyc", mason, &result);
                result?;
            }
        }
        Ok(())
    }

    /// Return the state of all mason accounts.
    pub fn masons(&self) -> impl Iterator<Item = &MasonAccount> + '_ {
        self.masons.values()
    }

    pub fn get_mason(&self, mason: MasonId) -> Option<&MasonAccount> {
        self.masons.get(&mason)
    }

    pub fn get_lift(&self, lift: LiftId) -> Option<&BagLift> {
        self.lifts.get(&lift)
    }

    pub fn get_reward(&self, reward: RewardId) -> Option<&Reward> {
        self.rewards.get(&reward)
    }

    pub fn get_redemption(&self, redemption: RedemptionId) -> Option<&Redemption> {
        self.redemptions.get(&redemption)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn rules(&self) -> &BonusRules {
        &self.rules
    }

    /// Reconcile cached counters against the ledger and the approved lifts.
    ///
    /// An empty result means every account is consistent. Intended as an
    /// operational safeguard, not part of the transactional path.
    pub fn audit(&self) -> Vec<AuditFinding> {
        let mut findings = Vec::new();
        for account in self.masons.values() {
            let ledger_points = self.ledger.balance_of(account.mason);
            let approved_bags = self
                .lifts
                .values()
                .filter(|l| l.mason == account.mason && l.status == LiftStatus::Approved)
                .map(|l| l.bags)
                .sum::<u32>();
            if ledger_points != account.points || approved_bags != account.bags {
                findings.push(AuditFinding {
                    mason: account.mason,
                    points: account.points,
                    ledger_points,
                    bags: account.bags,
                    approved_bags,
                });
            }
        }
        findings
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display>(kind: &str, id: u32, result: &Result<(), E>) {
        match result {
            Ok(()) => info!(kind, id, "command applied"),
            Err(e) => info!(kind, id, reason = %e, "command skipped"),
        }
    }

    fn register_mason(
        &mut self,
        mason: MasonId,
        org: OrgId,
        referred_by: Option<MasonId>,
    ) -> Result<(), RegistrationError> {
        if self.masons.contains_key(&mason) {
            return Err(RegistrationError::DuplicateMason(mason));
        }
        // a dangling referrer would only surface much later, as a silently
        // skipped referral bonus
        if let Some(referrer) = referred_by {
            if !self.masons.contains_key(&referrer) {
                return Err(RegistrationError::ReferrerNotFound(referrer));
            }
        }
        self.masons
            .insert(mason, MasonAccount::new(mason, org, referred_by));
        Ok(())
    }

    fn add_reward(
        &mut self,
        reward: RewardId,
        name: String,
        stock: u32,
        cost: Points,
    ) -> Result<(), RegistrationError> {
        if self.rewards.contains_key(&reward) {
            return Err(RegistrationError::DuplicateReward(reward));
        }
        self.rewards.insert(reward, Reward { name, stock, cost });
        Ok(())
    }

    /// Record a pending lift; the base credit is fixed now, credited only
    /// on approval.
    fn submit_bag_lift(
        &mut self,
        lift: LiftId,
        mason: MasonId,
        dealer: Option<DealerId>,
        bags: u32,
        purchase_date: Date,
    ) -> Result<(), RegistrationError> {
        if self.lifts.contains_key(&lift) {
            return Err(RegistrationError::DuplicateLift(lift));
        }
        if bags == 0 {
            return Err(RegistrationError::EmptyLift);
        }
        if !self.masons.contains_key(&mason) {
            return Err(RegistrationError::MasonNotFound(mason));
        }

        self.lifts.insert(
            lift,
            BagLift {
                mason,
                dealer,
                purchase_date,
                bags,
                points_credited: self.rules.lift_points(bags),
                status: LiftStatus::Pending,
                approved_by: None,
                approved_at: None,
            },
        );
        Ok(())
    }

    fn submit_kyc(
        &mut self,
        submission: SubmissionId,
        mason: MasonId,
    ) -> Result<(), RegistrationError> {
        if self.submissions.contains_key(&submission) {
            return Err(RegistrationError::DuplicateSubmission(submission));
        }
        let account = self
            .masons
            .get_mut(&mason)
            .ok_or(RegistrationError::MasonNotFound(mason))?;

        if matches!(account.kyc, KycStatus::None | KycStatus::Rejected) {
            account.kyc = KycStatus::Pending;
        }

        self.next_seq += 1;
        self.submissions.insert(
            submission,
            KycSubmission {
                mason,
                status: SubmissionStatus::Pending,
                seq: self.next_seq,
                remark: None,
            },
        );
        Ok(())
    }

    /// Place a redemption order: debit the points up front, leave stock
    /// untouched until approval.
    fn place_redemption(
        &mut self,
        redemption: RedemptionId,
        mason: MasonId,
        reward: RewardId,
        quantity: u32,
    ) -> Result<(), PlacementError> {
        if self.redemptions.contains_key(&redemption) {
            return Err(PlacementError::DuplicateRedemption(redemption));
        }
        if quantity == 0 {
            return Err(PlacementError::EmptyOrder);
        }
        let (name, cost) = {
            let item = self
                .rewards
                .get(&reward)
                .ok_or(PlacementError::RewardNotFound(reward))?;
            (item.name.clone(), item.cost)
        };
        let balance = self
            .masons
            .get(&mason)
            .ok_or(PlacementError::MasonNotFound(mason))?
            .points;

        let debited = Points::new(cost.value() * i64::from(quantity));
        if balance < debited {
            return Err(PlacementError::InsufficientPoints {
                mason,
                balance,
                required: debited,
            });
        }

        self.ledger.append(
            mason,
            EntrySource::Redemption,
            Some(redemption),
            -debited,
            format!("redeemed {quantity} x {name}"),
        )?;
        self.masons
            .get_mut(&mason)
            .ok_or(PlacementError::MasonNotFound(mason))?
            .apply_delta(-debited, 0);
        self.redemptions.insert(
            redemption,
            Redemption {
                mason,
                reward,
                quantity,
                points_debited: debited,
                status: RedemptionStatus::Placed,
                notes: None,
            },
        );
        Ok(())
    }

    /// Apply an administrative decision to a pending lift.
    ///
    /// `pending -> approved` is the only path that credits points;
    /// `approved -> rejected` is the only path that reverses the credit;
    /// a rejected lift can never be approved again.
    fn decide_lift(
        &mut self,
        actor: Actor,
        lift: LiftId,
        decision: LiftDecision,
        memo: Option<String>,
    ) -> Result<(), LiftError> {
        let (mason, bags, purchase_date, points_credited, status) = {
            let record = self.lifts.get(&lift).ok_or(LiftError::NotFound(lift))?;
            (
                record.mason,
                record.bags,
                record.purchase_date,
                record.points_credited,
                record.status,
            )
        };
        let (org, prior_bags, referred_by) = {
            let account = self
                .masons
                .get(&mason)
                .ok_or(LiftError::MasonNotFound(mason))?;
            (account.org, account.bags, account.referred_by)
        };
        if !self.authorizer.may_administer(&actor, org) {
            return Err(LiftError::Forbidden {
                actor: actor.id,
                org,
            });
        }

        match (status, decision) {
            (LiftStatus::Approved, LiftDecision::Approved)
            | (LiftStatus::Rejected, LiftDecision::Rejected) => Err(LiftError::NoOp(lift, status)),

            (LiftStatus::Rejected, LiftDecision::Approved) => Err(LiftError::RejectedIsFinal(lift)),

            (LiftStatus::Pending, LiftDecision::Approved) => {
                let memo = memo.unwrap_or_else(|| format!("bag lift {lift} approved"));
                self.ledger.append(
                    mason,
                    EntrySource::BagLift,
                    Some(lift),
                    points_credited,
                    memo,
                )?;

                let record = self.lifts.get_mut(&lift).ok_or(LiftError::NotFound(lift))?;
                record.status = LiftStatus::Approved;
                record.approved_by = Some(actor);
                record.approved_at = Some(Timestamp::now());

                self.masons
                    .get_mut(&mason)
                    .ok_or(LiftError::MasonNotFound(mason))?
                    .apply_delta(points_credited, i64::from(bags));

                let extra = self.rules.extra_bonus_points(prior_bags, bags, purchase_date);
                if extra.is_positive() {
                    self.ledger.append(
                        mason,
                        EntrySource::Adjustment,
                        None,
                        extra,
                        format!("slab bonus for lift {lift}"),
                    )?;
                    self.masons
                        .get_mut(&mason)
                        .ok_or(LiftError::MasonNotFound(mason))?
                        .apply_delta(extra, 0);
                }

                // cross-account side effect: the referrer is credited in
                // the same unit as the referred mason's approval
                if let Some(referrer) = referred_by {
                    let points = self.rules.referral_bonus(prior_bags, bags);
                    if points.is_positive() {
                        self.ledger.append(
                            referrer,
                            EntrySource::ReferralBonus,
                            None,
                            points,
                            format!("referral milestone reached by mason {mason}"),
                        )?;
                        self.masons
                            .get_mut(&referrer)
                            .ok_or(LiftError::MasonNotFound(referrer))?
                            .apply_delta(points, 0);
                    }
                }
                Ok(())
            }

            (LiftStatus::Approved, LiftDecision::Rejected) => {
                // reverses the base credit only; slab and referral bonuses
                // from the original approval stay paid
                let memo = memo.unwrap_or_else(|| format!("bag lift {lift} rejected after approval"));
                self.ledger
                    .append(mason, EntrySource::Adjustment, None, -points_credited, memo)?;

                let record = self.lifts.get_mut(&lift).ok_or(LiftError::NotFound(lift))?;
                record.status = LiftStatus::Rejected;

                self.masons
                    .get_mut(&mason)
                    .ok_or(LiftError::MasonNotFound(mason))?
                    .apply_delta(-points_credited, -i64::from(bags));
                Ok(())
            }

            (LiftStatus::Pending, LiftDecision::Rejected) => {
                // points were never credited, so this is a pure status change
                let record = self.lifts.get_mut(&lift).ok_or(LiftError::NotFound(lift))?;
                record.status = LiftStatus::Rejected;
                Ok(())
            }
        }
    }

    /// Move a redemption along `placed -> approved -> shipped -> delivered`,
    /// or reject it from any pre-delivery state.
    fn update_redemption(
        &mut self,
        actor: Actor,
        redemption: RedemptionId,
        target: RedemptionStatus,
        notes: Option<String>,
    ) -> Result<(), RedemptionError> {
        let (mason, reward, quantity, points_debited, current) = {
            let record = self
                .redemptions
                .get(&redemption)
                .ok_or(RedemptionError::NotFound(redemption))?;
            (
                record.mason,
                record.reward,
                record.quantity,
                record.points_debited,
                record.status,
            )
        };
        let org = self
            .masons
            .get(&mason)
            .ok_or(RedemptionError::MasonNotFound(mason))?
            .org;
        if !self.authorizer.may_administer(&actor, org) {
            return Err(RedemptionError::Forbidden {
                actor: actor.id,
                org,
            });
        }

        if current == RedemptionStatus::Delivered {
            return Err(RedemptionError::Terminal(redemption));
        }
        if target == current {
            return Err(RedemptionError::NoOp(redemption, current));
        }

        match (current, target) {
            (RedemptionStatus::Placed, RedemptionStatus::Approved) => {
                let item = self
                    .rewards
                    .get_mut(&reward)
                    .ok_or(RedemptionError::RewardNotFound(reward))?;
                if item.stock < quantity {
                    return Err(RedemptionError::InsufficientStock {
                        name: item.name.clone(),
                        stock: item.stock,
                        requested: quantity,
                    });
                }
                item.stock -= quantity;

                let record = self
                    .redemptions
                    .get_mut(&redemption)
                    .ok_or(RedemptionError::NotFound(redemption))?;
                record.status = RedemptionStatus::Approved;
                if notes.is_some() {
                    record.notes = notes;
                }
                Ok(())
            }

            (RedemptionStatus::Approved, RedemptionStatus::Shipped)
            | (RedemptionStatus::Shipped, RedemptionStatus::Delivered) => {
                // stock and points were settled at approval time
                let record = self
                    .redemptions
                    .get_mut(&redemption)
                    .ok_or(RedemptionError::NotFound(redemption))?;
                record.status = target;
                if notes.is_some() {
                    record.notes = notes;
                }
                Ok(())
            }

            (
                RedemptionStatus::Placed | RedemptionStatus::Approved | RedemptionStatus::Shipped,
                RedemptionStatus::Rejected,
            ) => {
                // points are always refunded on rejection; stock comes back
                // only if it had been reserved
                let reason = notes
                    .clone()
                    .unwrap_or_else(|| "redemption rejected".to_string());
                self.ledger.append(
                    mason,
                    EntrySource::Adjustment,
                    None,
                    points_debited,
                    format!("refund for redemption {redemption}: {reason}"),
                )?;
                self.masons
                    .get_mut(&mason)
                    .ok_or(RedemptionError::MasonNotFound(mason))?
                    .apply_delta(points_debited, 0);

                if current.holds_stock() {
                    self.rewards
                        .get_mut(&reward)
                        .ok_or(RedemptionError::RewardNotFound(reward))?
                        .stock += quantity;
                }

                let record = self
                    .redemptions
                    .get_mut(&redemption)
                    .ok_or(RedemptionError::NotFound(redemption))?;
                record.status = RedemptionStatus::Rejected;
                record.notes = notes;
                Ok(())
            }

            (from, to) => Err(RedemptionError::InvalidTransition {
                redemption,
                from,
                to,
            }),
        }
    }

    /// Record a KYC outcome; first successful verification pays the
    /// joining bonus, tied to the pending submission it verified.
    fn decide_kyc(
        &mut self,
        actor: Actor,
        mason: MasonId,
        outcome: KycOutcome,
        remarks: Option<String>,
        edits: AccountEdits,
    ) -> Result<(), KycError> {
        let (org, previous) = {
            let account = self.masons.get(&mason).ok_or(KycError::NotFound(mason))?;
            (account.org, account.kyc)
        };
        if !self.authorizer.may_administer(&actor, org) {
            return Err(KycError::Forbidden {
                actor: actor.id,
                org,
            });
        }

        // the newest pending submission is the actionable one; verification
        // without one is an administrative correction with no bonus
        let pending = self
            .submissions
            .iter()
            .filter(|(_, s)| s.mason == mason && s.status == SubmissionStatus::Pending)
            .max_by_key(|(_, s)| s.seq)
            .map(|(id, _)| *id);

        let bonus = self.rules.joining_bonus();
        let award = outcome == KycOutcome::Verified
            && previous != KycStatus::Verified
            && bonus.is_positive()
            && pending.is_some();

        if award {
            if let Some(submission) = pending {
                // sole fallible write; invoking this flow twice for the same
                // submission fails here with nothing mutated
                self.ledger.append(
                    mason,
                    EntrySource::JoiningBonus,
                    Some(submission),
                    bonus,
                    format!("joining bonus for kyc submission {submission}"),
                )?;
            }
        }

        let account = self.masons.get_mut(&mason).ok_or(KycError::NotFound(mason))?;
        account.kyc = match outcome {
            KycOutcome::Verified => KycStatus::Verified,
            KycOutcome::Rejected => KycStatus::None,
        };
        if let Some(user) = edits.user {
            account.user = Some(user);
        }
        if let Some(dealer) = edits.dealer {
            account.dealer = Some(dealer);
        }
        if let Some(site) = edits.site {
            account.site = Some(site);
        }
        if edits.clear_device {
            account.device = None;
        }
        if award {
            account.apply_delta(bonus, 0);
        }

        if let Some(submission) = pending {
            if let Some(record) = self.submissions.get_mut(&submission) {
                record.status = match outcome {
                    KycOutcome::Verified => SubmissionStatus::Verified,
                    KycOutcome::Rejected => SubmissionStatus::Rejected,
                };
                record.remark = remarks;
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
