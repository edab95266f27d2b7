use hg_cards::Strength;
use hg_cards::tiers;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Chips in the middle, tracked per contributor.
///
/// Street wagers fold into the contribution map at the end of each betting
/// round; the map is what side-pot derivation and settlement run on.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pot {
    total: Chips,
    contributions: BTreeMap<ID<Member>, Chips>,
}

/// One layer of the pot with the players who can win it.
///
/// Pots are ordered main-first: earlier pots are eligible to strictly
/// more players than later ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: BTreeSet<ID<Member>>,
}

impl Pot {
    pub fn total(&self) -> Chips {
        self.total
    }
    pub fn contribution(&self, user: ID<Member>) -> Chips {
        self.contributions.get(&user).copied().unwrap_or(0)
    }
    pub fn contributions(&self) -> &BTreeMap<ID<Member>, Chips> {
        &self.contributions
    }
    /// Folds a finished street's wager into the contribution map.
    pub fn contribute(&mut self, user: ID<Member>, amount: Chips) {
        if amount > 0 {
            *self.contributions.entry(user).or_insert(0) += amount;
            self.total += amount;
        }
    }
    pub fn reset(&mut self) {
        self.total = 0;
        self.contributions.clear();
    }

    /// Derives the ordered list of side pots from all-in totals.
    ///
    /// For each all-in level `L` above the previous level `P`, the pot
    /// takes `min(contribution, L) − P` (where positive) from every
    /// contributor and is winnable by those who put in at least `L`.
    /// Whatever sits above the top level forms a final pot for the
    /// contributors strictly beyond it. The derived amounts always sum
    /// back to the total.
    pub fn side_pots(&self, all_in: &BTreeMap<ID<Member>, Chips>) -> Vec<SidePot> {
        if all_in.is_empty() {
            return vec![SidePot {
                amount: self.total,
                eligible: self.contributions.keys().copied().collect(),
            }];
        }
        let levels = all_in
            .values()
            .copied()
            .collect::<BTreeSet<Chips>>()
            .into_iter()
            .collect::<Vec<Chips>>();
        let mut pots = Vec::new();
        let mut prev = 0;
        for level in levels.iter().copied() {
            let amount = self
                .contributions
                .values()
                .map(|c| (c.min(&level) - prev).max(0))
                .sum::<Chips>();
            if amount > 0 {
                pots.push(SidePot {
                    amount,
                    eligible: self.eligible_at(level),
                });
            }
            prev = level;
        }
        let top = levels.last().copied().expect("nonempty levels");
        let residual = self
            .contributions
            .values()
            .map(|c| (c - top).max(0))
            .sum::<Chips>();
        if residual > 0 {
            pots.push(SidePot {
                amount: residual,
                eligible: self
                    .contributions
                    .iter()
                    .filter(|(_, c)| **c > top)
                    .map(|(u, _)| *u)
                    .collect(),
            });
        }
        debug_assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), self.total);
        pots
    }

    fn eligible_at(&self, level: Chips) -> BTreeSet<ID<Member>> {
        self.contributions
            .iter()
            .filter(|(_, c)| **c >= level)
            .map(|(u, _)| *u)
            .collect()
    }
}

/// Distributes every pot to its winners.
///
/// Winners per pot are the best tie group among eligible players still
/// contending at showdown. Each pot splits by integer division with the
/// remainder handed out one chip at a time in `priority` order, which
/// the table supplies as ascending seat order from the first occupied
/// seat left of the dealer. A pot with no live contender goes back to
/// its eligible contributors (the uncalled-bet refund), so chips are
/// conserved unconditionally.
pub fn payout(
    pots: &[SidePot],
    strengths: &BTreeMap<ID<Member>, Strength>,
    priority: &[ID<Member>],
) -> BTreeMap<ID<Member>, Chips> {
    let mut winnings = BTreeMap::new();
    for pot in pots {
        let live = pot
            .eligible
            .iter()
            .filter_map(|u| strengths.get(u).map(|s| (*u, *s)))
            .collect::<Vec<_>>();
        let mut winners = match live.is_empty() {
            true => pot.eligible.iter().copied().collect::<Vec<_>>(),
            false => tiers(live).remove(0),
        };
        if winners.is_empty() {
            continue;
        }
        winners.sort_by_key(|u| priority.iter().position(|p| p == u).unwrap_or(usize::MAX));
        let share = pot.amount / winners.len() as Chips;
        let bonus = pot.amount % winners.len() as Chips;
        for user in winners.iter() {
            *winnings.entry(*user).or_insert(0) += share;
        }
        for user in winners.iter().take(bonus as usize) {
            *winnings.entry(*user).or_insert(0) += 1;
        }
    }
    winnings
}
