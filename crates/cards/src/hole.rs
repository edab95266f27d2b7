use super::card::Card;
use super::hand::Hand;

/// A player's two private hole cards.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Hole(Card, Card);

impl From<(Card, Card)> for Hole {
    fn from((a, b): (Card, Card)) -> Self {
        Self(a, b)
    }
}

impl From<Hole> for Hand {
    fn from(hole: Hole) -> Self {
        Hand::empty().add(hole.0).add(hole.1)
    }
}

impl Hole {
    pub fn cards(&self) -> [Card; 2] {
        [self.0, self.1]
    }
    /// Wire form: the two glyph pairs, e.g. `["As", "Kd"]`.
    pub fn glyphs(&self) -> Vec<String> {
        self.cards().iter().map(|c| c.to_string()).collect()
    }
}

impl std::fmt::Display for Hole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}
