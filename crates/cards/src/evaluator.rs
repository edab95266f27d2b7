use super::card::Card;
use super::hand::Hand;
use super::kickers::Kickers;
use super::rank::Rank;
use super::ranking::Ranking;
use super::suit::Suit;

/// A lazy evaluator for a hand's strength.
///
/// Works on the compact bitstring representation of a [`Hand`] holding the
/// 5 to 7 cards available to a player (hole cards plus board), searching
/// for the best category with bitwise operations. The result is identical
/// to enumerating every 5-card subset and keeping the best.
pub struct Evaluator(Hand);

impl From<Hand> for Evaluator {
    fn from(h: Hand) -> Self {
        debug_assert!(h.size() >= 5);
        debug_assert!(h.size() <= 7);
        Self(h)
    }
}

impl Evaluator {
    /// The best category this set of cards can make.
    ///
    /// With at most 7 cards a flush excludes quads and full houses
    /// (5 + 4 − 1 > 7), so the flush family can be checked first.
    pub fn find_ranking(&self) -> Ranking {
        None.or_else(|| self.find_flush())
            .or_else(|| self.find_4_oak())
            .or_else(|| self.find_full_house())
            .or_else(|| self.find_straight())
            .or_else(|| self.find_3_oak())
            .or_else(|| self.find_2_oak_2_oak())
            .or_else(|| self.find_2_oak())
            .or_else(|| self.find_1_oak())
            .expect("at least one card in Hand")
    }
    /// The side cards that break ties within the given category.
    pub fn find_kickers(&self, ranking: Ranking) -> Kickers {
        match ranking {
            Ranking::Flush(hi) => self.find_flush_kickers(hi),
            Ranking::TwoPair(hi, lo) => self.keep_best(1, u16::from(hi) | u16::from(lo)),
            Ranking::HighCard(hi) => self.keep_best(4, u16::from(hi)),
            Ranking::OnePair(hi) => self.keep_best(3, u16::from(hi)),
            Ranking::ThreeOAK(hi) => self.keep_best(2, u16::from(hi)),
            Ranking::FourOAK(hi) => self.keep_best(1, u16::from(hi)),
            _ => Kickers::default(),
        }
    }

    //

    fn find_1_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(1).map(Ranking::HighCard)
    }
    fn find_2_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(2).map(Ranking::OnePair)
    }
    fn find_3_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(3).map(Ranking::ThreeOAK)
    }
    fn find_4_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(4).map(Ranking::FourOAK)
    }
    fn find_2_oak_2_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(2).and_then(|hi| {
            self.find_rank_of_n_oak_except(2, hi)
                .map(|lo| Ranking::TwoPair(hi, lo))
        })
    }
    fn find_full_house(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(3).and_then(|trips| {
            self.find_rank_of_n_oak_except(2, trips)
                .map(|pair| Ranking::FullHouse(trips, pair))
        })
    }
    fn find_straight(&self) -> Option<Ranking> {
        self.find_rank_of_straight(self.rank_masks())
            .map(Ranking::Straight)
    }
    fn find_flush(&self) -> Option<Ranking> {
        self.find_suit_of_flush().map(|suit| {
            match self.find_rank_of_straight(self.suit_masks()[suit as usize]) {
                Some(Rank::Ace) => Ranking::RoyalFlush,
                Some(rank) => Ranking::StraightFlush(rank),
                None => Ranking::Flush(Rank::from(self.keep_n(5, self.suit_masks()[suit as usize]))),
            }
        })
    }

    //

    fn find_rank_of_straight(&self, ranks: u16) -> Option<Rank> {
        const WHEEL: u16 = 0b_1000000001111;
        let mut bits = ranks;
        bits &= bits << 1;
        bits &= bits << 1;
        bits &= bits << 1;
        bits &= bits << 1;
        if bits > 0 {
            Some(Rank::from(bits))
        } else if WHEEL == (WHEEL & ranks) {
            Some(Rank::Five)
        } else {
            None
        }
    }
    fn find_suit_of_flush(&self) -> Option<Suit> {
        self.suit_masks()
            .iter()
            .position(|&bits| bits.count_ones() >= 5)
            .map(|i| Suit::from(i as u8))
    }
    /// Highest rank held by at least `oak` cards.
    fn find_rank_of_n_oak(&self, oak: u32) -> Option<Rank> {
        self.scan_n_oak(oak, None)
    }
    /// Highest rank other than `except` held by at least `oak` cards.
    /// A full house's pair may sit above or below the trips rank.
    fn find_rank_of_n_oak_except(&self, oak: u32, except: Rank) -> Option<Rank> {
        self.scan_n_oak(oak, Some(except))
    }
    fn scan_n_oak(&self, oak: u32, except: Option<Rank>) -> Option<Rank> {
        let hand = u64::from(self.0);
        (0..13u8)
            .rev()
            .filter(|r| Some(Rank::from(*r)) != except)
            .find(|r| (hand >> (4 * r) & 0b1111).count_ones() >= oak)
            .map(Rank::from)
    }

    //

    /// Kickers = the `n` highest held ranks outside the category's ranks.
    fn keep_best(&self, n: u32, used: u16) -> Kickers {
        Kickers::from(self.keep_n(n, self.rank_masks() & !used))
    }
    /// The four flush ranks under the flush's high card.
    fn find_flush_kickers(&self, hi: Rank) -> Kickers {
        let suit = self.find_suit_of_flush().expect("flush was found");
        let bits = self.suit_masks()[suit as usize] & !u16::from(hi);
        Kickers::from(self.keep_n(4, bits))
    }
    /// Reduce a rank mask to its `n` highest bits.
    fn keep_n(&self, n: u32, mut bits: u16) -> u16 {
        while bits.count_ones() > n {
            bits &= !(1 << bits.trailing_zeros());
        }
        bits
    }

    //

    /// which ranks are in the hand, neglecting suit
    fn rank_masks(&self) -> u16 {
        Vec::<Card>::from(self.0)
            .iter()
            .map(|c| u16::from(c.rank()))
            .fold(0, |acc, r| acc | r)
    }
    /// which ranks are in the hand, grouped by suit
    fn suit_masks(&self) -> [u16; 4] {
        Vec::<Card>::from(self.0)
            .iter()
            .map(|c| (u8::from(c.suit()), u16::from(c.rank())))
            .fold([0; 4], |mut suits, (s, r)| {
                suits[s as usize] |= r;
                suits
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(s: &str) -> Ranking {
        let hand = Hand::from(Card::parse(s).unwrap());
        Evaluator::from(hand).find_ranking()
    }
    fn kickers(s: &str) -> Vec<Rank> {
        let hand = Hand::from(Card::parse(s).unwrap());
        let evaluator = Evaluator::from(hand);
        let ranking = evaluator.find_ranking();
        evaluator.find_kickers(ranking).ranks()
    }

    #[test]
    fn high_card() {
        assert_eq!(ranking("As Kh Qd Jc 9s"), Ranking::HighCard(Rank::Ace));
    }

    #[test]
    fn one_pair() {
        assert_eq!(ranking("As Ah Kd Qc Js"), Ranking::OnePair(Rank::Ace));
    }

    #[test]
    fn two_pair() {
        assert_eq!(ranking("As Ah Kd Kc Qs"), Ranking::TwoPair(Rank::Ace, Rank::King));
    }

    #[test]
    fn three_oak() {
        assert_eq!(ranking("As Ah Ad Kc Qs"), Ranking::ThreeOAK(Rank::Ace));
    }

    #[test]
    fn straight() {
        assert_eq!(ranking("Ts Jh Qd Kc As"), Ranking::Straight(Rank::Ace));
    }

    #[test]
    fn flush() {
        assert_eq!(ranking("As Ks Qs Js 9s"), Ranking::Flush(Rank::Ace));
    }

    #[test]
    fn full_house() {
        assert_eq!(ranking("As Ah Ad Kc Ks"), Ranking::FullHouse(Rank::Ace, Rank::King));
    }

    #[test]
    fn four_oak() {
        assert_eq!(ranking("As Ah Ad Ac Ks"), Ranking::FourOAK(Rank::Ace));
    }

    #[test]
    fn straight_flush() {
        assert_eq!(ranking("5s 6s 7s 8s 9s"), Ranking::StraightFlush(Rank::Nine));
    }

    #[test]
    fn royal_flush() {
        assert_eq!(ranking("Ts Js Qs Ks As"), Ranking::RoyalFlush);
    }

    #[test]
    fn wheel_straight() {
        assert_eq!(ranking("As 2h 3d 4c 5s"), Ranking::Straight(Rank::Five));
    }

    #[test]
    fn wheel_straight_flush() {
        assert_eq!(ranking("As 2s 3s 4s 5s"), Ranking::StraightFlush(Rank::Five));
    }

    #[test]
    fn wheel_loses_to_six_high() {
        let wheel = ranking("As 2h 3d 4c 5s");
        let sixhigh = ranking("2h 3d 4c 5s 6h");
        assert!(sixhigh > wheel);
    }

    #[test]
    fn seven_card_hand() {
        assert_eq!(
            ranking("As Ah Kd Kc Qs Jh 9d"),
            Ranking::TwoPair(Rank::Ace, Rank::King)
        );
    }

    #[test]
    fn flush_vs_straight() {
        assert_eq!(ranking("4h 6h 7h 8h 9h Ts"), Ranking::Flush(Rank::Nine));
    }

    #[test]
    fn pair_above_trips_makes_full_house() {
        // the pair outranks the trips; a below-only search would miss it
        assert_eq!(
            ranking("As Ah Kd Kc Kh Qd Js"),
            Ranking::FullHouse(Rank::King, Rank::Ace)
        );
    }

    #[test]
    fn two_three_oak() {
        assert_eq!(
            ranking("As Ah Ad Kc Ks Kh Qd"),
            Ranking::FullHouse(Rank::Ace, Rank::King)
        );
    }

    #[test]
    fn four_oak_vs_full_house() {
        assert_eq!(ranking("As Ah Ad Ac Ks Kh Qd"), Ranking::FourOAK(Rank::Ace));
    }

    #[test]
    fn straight_flush_vs_four_oak() {
        assert_eq!(ranking("Ts Js Qs Ks As Ah Ad"), Ranking::RoyalFlush);
    }

    #[test]
    fn low_straight_prefers_six_high() {
        assert_eq!(ranking("As 2s 3h 4d 5c 6s"), Ranking::Straight(Rank::Six));
    }

    #[test]
    fn three_pair_keeps_best_two() {
        assert_eq!(
            ranking("As Ah Kd Kc Qs Qh Jd"),
            Ranking::TwoPair(Rank::Ace, Rank::King)
        );
    }

    #[test]
    fn high_card_kickers() {
        assert_eq!(
            kickers("As Kh Qd Jc 9s"),
            vec![Rank::King, Rank::Queen, Rank::Jack, Rank::Nine]
        );
    }

    #[test]
    fn pair_kickers_top_three_of_seven() {
        assert_eq!(
            kickers("As Ah Kd Qc Js 9h 2d"),
            vec![Rank::King, Rank::Queen, Rank::Jack]
        );
    }

    #[test]
    fn flush_kickers_are_the_flush_ranks() {
        // seven hearts would be impossible; six cards, five hearts
        assert_eq!(
            kickers("Ah Kh 9h 7h 2h Ks"),
            vec![Rank::King, Rank::Nine, Rank::Seven, Rank::Two]
        );
    }

    #[test]
    fn flush_kickers_drop_sixth_flush_card() {
        let better = kickers("Ah Kh 9h 7h 3h 2h 2s");
        assert_eq!(
            better,
            vec![Rank::King, Rank::Nine, Rank::Seven, Rank::Three]
        );
    }
}
