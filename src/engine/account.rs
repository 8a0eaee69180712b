use crate::Points;
use crate::model::{DealerId, KycStatus, MasonId, OrgId, SiteId, UserId};

/// A mason account with its denormalized counters.
///
/// `points` and `bags` mirror the ledger and the set of approved lifts;
/// they are only ever moved by relative deltas applied in the same commit
/// as the justifying ledger append.
#[derive(Debug, Clone)]
pub struct MasonAccount {
    pub mason: MasonId,
    pub org: OrgId,
    pub points: Points,
    pub bags: u32,
    pub kyc: KycStatus,
    pub referred_by: Option<MasonId>,
    pub user: Option<UserId>,
    pub dealer: Option<DealerId>,
    pub site: Option<SiteId>,
    pub device: Option<String>,
}

impl MasonAccount {
    pub fn new(mason: MasonId, org: OrgId, referred_by: Option<MasonId>) -> Self {
        Self {
            mason,
            org,
            points: Points::ZERO,
            bags: 0,
            kyc: KycStatus::None,
            referred_by,
            user: None,
            dealer: None,
            site: None,
            device: None,
        }
    }

    /// Apply a relative delta to the cached counters. The bag counter
    /// saturates at the `u32` bounds rather than wrapping.
    pub fn apply_delta(&mut self, points: Points, bags: i64) {
        self.points += points;
        self.bags = (i64::from(self.bags) + bags).clamp(0, i64::from(u32::MAX)) as u32;
    }
}
