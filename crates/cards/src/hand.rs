use super::card::Card;

/// Hand is a bitstring of 52 bits stored as a u64.
/// Each bit represents a card in the (unordered) set.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hand(u64);

impl Hand {
    pub fn empty() -> Self {
        Self(0)
    }
    pub fn size(&self) -> usize {
        self.0.count_ones() as usize
    }
    pub fn contains(&self, card: &Card) -> bool {
        self.0 & u64::from(*card) != 0
    }
    pub fn add(self, card: Card) -> Self {
        Self(self.0 | u64::from(card))
    }
    pub fn or(a: Self, b: Self) -> Self {
        Self(a.0 | b.0)
    }
}

/// u64 isomorphism
impl From<u64> for Hand {
    fn from(n: u64) -> Self {
        Self(n)
    }
}
impl From<Hand> for u64 {
    fn from(hand: Hand) -> Self {
        hand.0
    }
}

/// Card morphism
impl From<Card> for Hand {
    fn from(card: Card) -> Self {
        Self(u64::from(card))
    }
}

/// Vec<Card> isomorphism
/// we OR the cards to get the bitstring
impl From<Vec<Card>> for Hand {
    fn from(cards: Vec<Card>) -> Self {
        cards.into_iter().fold(Self::empty(), Self::add)
    }
}
/// we pluck the 1s out of the bitstring, low card first
impl From<Hand> for Vec<Card> {
    fn from(hand: Hand) -> Self {
        (0..52u8)
            .filter(|i| hand.0 & (1 << i) != 0)
            .map(Card::from)
            .collect()
    }
}

impl std::fmt::Display for Hand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for card in Vec::<Card>::from(*self) {
            write!(f, "{} ", card)?;
        }
        Ok(())
    }
}
