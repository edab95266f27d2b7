use super::evaluator::Evaluator;
use super::hand::Hand;
use super::kickers::Kickers;
use super::ranking::Ranking;

/// A hand's full strength.
///
/// Category first, then the category's embedded ranks, then kickers:
/// the derived ordering is exactly the comparison the table uses at
/// showdown. Always constructed from the unordered set of cards a
/// player can use.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Strength {
    ranking: Ranking,
    kickers: Kickers,
}

impl Strength {
    pub fn ranking(&self) -> Ranking {
        self.ranking
    }
    pub fn kickers(&self) -> Kickers {
        self.kickers
    }
}

impl From<Hand> for Strength {
    fn from(hand: Hand) -> Self {
        Self::from(Evaluator::from(hand))
    }
}

impl From<Evaluator> for Strength {
    fn from(e: Evaluator) -> Self {
        let ranking = e.find_ranking();
        let kickers = e.find_kickers(ranking);
        Self::from((ranking, kickers))
    }
}

impl From<(Ranking, Kickers)> for Strength {
    fn from((ranking, kickers): (Ranking, Kickers)) -> Self {
        Self { ranking, kickers }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:<18}{:>5}", self.ranking, self.kickers)
    }
}

/// Groups hands into ordered tiers: group 0 holds the best hands (ties
/// together), group 1 the next best, and so on. Two hands tie iff their
/// category and full tiebreak vector are equal.
pub fn tiers<I>(mut hands: Vec<(I, Strength)>) -> Vec<Vec<I>> {
    hands.sort_by(|a, b| b.1.cmp(&a.1));
    hands
        .into_iter()
        .fold(Vec::<(Strength, Vec<I>)>::new(), |mut groups, (id, s)| {
            let tied = groups.last().map(|(top, _)| *top == s).unwrap_or(false);
            match tied {
                true => groups.last_mut().expect("nonempty").1.push(id),
                false => groups.push((s, vec![id])),
            }
            groups
        })
        .into_iter()
        .map(|(_, group)| group)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::card::Card;
    use super::*;

    fn strength(s: &str) -> Strength {
        Strength::from(Hand::from(Card::parse(s).unwrap()))
    }

    #[test]
    fn kickers_break_ties() {
        let better = strength("As Ah Kd Qc Js");
        let worse = strength("Ac Ad Kh Qs Ts");
        assert!(better > worse);
    }

    #[test]
    fn identical_hands_tie() {
        let a = strength("As Ah Kd Qc Js");
        let b = strength("Ac Ad Kh Qd Jc");
        assert_eq!(a, b);
    }

    #[test]
    fn tiers_group_equal_strengths() {
        let nut = strength("Ts Js Qs Ks As");
        let pair_a = strength("As Ah Kd Qc Js");
        let pair_b = strength("Ac Ad Kh Qd Jc");
        let high = strength("Kh Qd Jc 9s 2h");
        let groups = tiers(vec![(0, pair_a), (1, nut), (2, high), (3, pair_b)]);
        assert_eq!(groups, vec![vec![1], vec![0, 3], vec![2]]);
    }
}
