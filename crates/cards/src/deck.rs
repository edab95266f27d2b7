use super::card::Card;
use super::hole::Hole;
use super::rank::Rank;
use super::suit::Suit;
use std::collections::VecDeque;

/// An ordered deck of cards.
///
/// A fresh deck holds all 52 cards shuffled by the thread-local CSPRNG.
/// Dealing pops from the front; [`burn`](Self::burn) discards one card
/// before community cards the way a live dealer would. Every new hand
/// gets a freshly shuffled deck.
///
/// Tests can stack a deck from an explicit card order via `From<Vec<Card>>`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Deck(VecDeque<Card>);

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// Creates a fresh, shuffled 52-card deck.
    pub fn new() -> Self {
        use rand::seq::SliceRandom;
        let mut cards = Suit::all()
            .iter()
            .flat_map(|s| Rank::all().iter().map(move |r| Card::from((*r, *s))))
            .collect::<Vec<Card>>();
        cards.shuffle(&mut rand::rng());
        Self(cards.into())
    }
    /// Cards not yet dealt or burned.
    pub fn remaining(&self) -> usize {
        self.0.len()
    }
    /// Deals the next card off the top.
    pub fn draw(&mut self) -> Card {
        self.0.pop_front().expect("52 cards outlast any hand")
    }
    /// Discards the top card face down.
    pub fn burn(&mut self) {
        self.0.pop_front();
    }
    /// Deals two cards as a player's hole cards.
    pub fn hole(&mut self) -> Hole {
        let a = self.draw();
        let b = self.draw();
        Hole::from((a, b))
    }
}

/// stacked deck: the first card in the Vec is the first dealt
impl From<Vec<Card>> for Deck {
    fn from(cards: Vec<Card>) -> Self {
        Self(cards.into())
    }
}
