//! Pure point calculations: base credit, slab bonuses, referral milestones,
//! and the joining bonus.
//!
//! Slab and milestone tables change often in this domain, so they live in
//! [`BonusRules`] as data. Every function here depends only on its inputs;
//! nothing reads engine state or performs I/O, which keeps the business
//! rules exhaustively testable without a store.

use jiff::civil::Date;

use crate::Points;

/// One cumulative-bag threshold and the bonus it pays when crossed.
#[derive(Debug, Clone)]
pub struct SlabRule {
    /// Cumulative bag count at which the bonus triggers.
    pub threshold: u32,
    pub points: Points,
    /// First purchase date the rule applies to, inclusive.
    pub starts: Option<Date>,
    /// Last purchase date the rule applies to, inclusive.
    pub ends: Option<Date>,
}

impl SlabRule {
    pub fn new(threshold: u32, points: i64) -> Self {
        Self {
            threshold,
            points: Points::new(points),
            starts: None,
            ends: None,
        }
    }

    fn active_on(&self, date: Date) -> bool {
        self.starts.is_none_or(|s| date >= s) && self.ends.is_none_or(|e| date <= e)
    }
}

/// The configurable business rules of the program.
#[derive(Debug, Clone)]
pub struct BonusRules {
    /// Base credit per bag, fixed at lift submission time.
    pub points_per_bag: i64,
    /// Slab bonuses, sorted by threshold.
    pub slabs: Vec<SlabRule>,
    /// Milestones that pay the referring mason, sorted by threshold.
    pub referral_milestones: Vec<SlabRule>,
    /// One-time bonus on first successful KYC verification.
    pub joining_bonus: Points,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            points_per_bag: 5,
            slabs: vec![
                SlabRule::new(100, 20),
                SlabRule::new(500, 150),
                SlabRule::new(1000, 400),
            ],
            referral_milestones: vec![SlabRule::new(100, 50)],
            joining_bonus: Points::new(100),
        }
    }
}

impl BonusRules {
    /// Base credit for a lift of `bags` bags.
    pub fn lift_points(&self, bags: u32) -> Points {
        Points::new(self.points_per_bag * i64::from(bags))
    }

    /// Extra bonus earned by crossing slab thresholds with this lift.
    ///
    /// Sums every slab whose threshold lies in `(prior, prior + new]` and
    /// whose validity window contains the purchase date. Zero when no
    /// threshold is crossed.
    pub fn extra_bonus_points(&self, prior_bags: u32, new_bags: u32, purchase_date: Date) -> Points {
        Self::crossed(&self.slabs, prior_bags, new_bags)
            .filter(|rule| rule.active_on(purchase_date))
            .map(|rule| rule.points)
            .sum()
    }

    /// Referral bonus payable to the referrer when the referred mason
    /// crosses a milestone total with this lift. Zero otherwise.
    pub fn referral_bonus(&self, prior_bags: u32, new_bags: u32) -> Points {
        Self::crossed(&self.referral_milestones, prior_bags, new_bags)
            .map(|rule| rule.points)
            .sum()
    }

    /// Fixed joining bonus; callers must check for a positive amount
    /// before starting the bonus flow.
    pub fn joining_bonus(&self) -> Points {
        self.joining_bonus
    }

    fn crossed(rules: &[SlabRule], prior: u32, new: u32) -> impl Iterator<Item = &SlabRule> {
        let total = prior.saturating_add(new);
        rules
            .iter()
            .filter(move |rule| prior < rule.threshold && rule.threshold <= total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> Date {
        Date::constant(2025, 6, 1)
    }

    #[test]
    fn lift_points_scale_with_bags() {
        let rules = BonusRules::default();
        assert_eq!(rules.lift_points(10), Points::new(50));
        assert_eq!(rules.lift_points(0), Points::ZERO);
    }

    #[test]
    fn no_bonus_when_no_threshold_crossed() {
        let rules = BonusRules::default();
        assert_eq!(rules.extra_bonus_points(10, 20, date()), Points::ZERO);
        assert_eq!(rules.extra_bonus_points(100, 50, date()), Points::ZERO);
    }

    #[test]
    fn bonus_when_slab_crossed() {
        let rules = BonusRules::default();
        // 95 -> 105 crosses the 100-bag slab
        assert_eq!(rules.extra_bonus_points(95, 10, date()), Points::new(20));
    }

    #[test]
    fn bonus_exactly_at_threshold() {
        let rules = BonusRules::default();
        assert_eq!(rules.extra_bonus_points(90, 10, date()), Points::new(20));
        // already at the threshold before the lift: not crossed again
        assert_eq!(rules.extra_bonus_points(100, 10, date()), Points::ZERO);
    }

    #[test]
    fn one_lift_can_cross_several_slabs() {
        let rules = BonusRules::default();
        assert_eq!(rules.extra_bonus_points(50, 1000, date()), Points::new(570));
    }

    #[test]
    fn bonus_is_monotonic_in_new_bags() {
        let rules = BonusRules::default();
        let mut last = Points::ZERO;
        for new in 0..1200 {
            let bonus = rules.extra_bonus_points(40, new, date());
            assert!(bonus >= last, "bonus decreased at new_bags={new}");
            last = bonus;
        }
    }

    #[test]
    fn extreme_bag_totals_saturate_instead_of_overflowing() {
        let rules = BonusRules::default();
        // all default thresholds lie below the prior total
        assert_eq!(
            rules.extra_bonus_points(u32::MAX - 5, 10, date()),
            Points::ZERO
        );
        assert_eq!(rules.referral_bonus(u32::MAX - 5, 10), Points::ZERO);

        // a threshold at the ceiling is still reachable
        let mut rules = BonusRules::default();
        rules.slabs = vec![SlabRule::new(u32::MAX, 20)];
        assert_eq!(
            rules.extra_bonus_points(u32::MAX - 5, 10, date()),
            Points::new(20)
        );
    }

    #[test]
    fn slab_window_excludes_out_of_range_purchase() {
        let mut rules = BonusRules::default();
        rules.slabs = vec![SlabRule {
            threshold: 100,
            points: Points::new(20),
            starts: Some(Date::constant(2025, 1, 1)),
            ends: Some(Date::constant(2025, 12, 31)),
        }];

        assert_eq!(
            rules.extra_bonus_points(95, 10, Date::constant(2025, 6, 1)),
            Points::new(20)
        );
        assert_eq!(
            rules.extra_bonus_points(95, 10, Date::constant(2024, 6, 1)),
            Points::ZERO
        );
        assert_eq!(
            rules.extra_bonus_points(95, 10, Date::constant(2026, 1, 1)),
            Points::ZERO
        );
    }

    #[test]
    fn referral_bonus_on_milestone() {
        let rules = BonusRules::default();
        assert_eq!(rules.referral_bonus(95, 10), Points::new(50));
        assert_eq!(rules.referral_bonus(10, 20), Points::ZERO);
        assert_eq!(rules.referral_bonus(150, 10), Points::ZERO);
    }

    #[test]
    fn joining_bonus_is_fixed() {
        let rules = BonusRules::default();
        assert_eq!(rules.joining_bonus(), Points::new(100));

        let zeroed = BonusRules {
            joining_bonus: Points::ZERO,
            ..BonusRules::default()
        };
        assert_eq!(zeroed.joining_bonus(), Points::ZERO);
    }
}
