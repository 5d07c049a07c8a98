//! Working list of undecided opportunities and the undo history.

use shared::{
    domain::{OpportunityId, OpportunityStatus},
    protocol::Opportunity,
};

/// Number of cards stacked on screen; only the first one is interactive.
pub const VISIBLE_CARDS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub opportunity: Opportunity,
    pub index: usize,
    pub status: OpportunityStatus,
}

#[derive(Debug, Clone, Default)]
pub struct Deck {
    items: Vec<Opportunity>,
    history: Vec<DecisionRecord>,
}

impl Deck {
    /// Builds a deck, dropping repeated ids (first occurrence wins).
    pub fn new(items: Vec<Opportunity>) -> Self {
        let mut deck = Self::default();
        deck.replace(items);
        deck
    }

    /// Swaps in a fresh working list and forgets the history.
    pub fn replace(&mut self, items: Vec<Opportunity>) {
        self.items.clear();
        for item in items {
            if !self.contains(item.id) {
                self.items.push(item);
            }
        }
        self.history.clear();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.history.clear();
    }

    pub fn items(&self) -> &[Opportunity] {
        &self.items
    }

    pub fn history(&self) -> &[DecisionRecord] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn top(&self) -> Option<&Opportunity> {
        self.items.first()
    }

    pub fn visible(&self) -> &[Opportunity] {
        &self.items[..self.items.len().min(VISIBLE_CARDS)]
    }

    pub fn contains(&self, id: OpportunityId) -> bool {
        self.position_of(id).is_some()
    }

    pub fn position_of(&self, id: OpportunityId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Removes the opportunity and records the decision. Unknown ids leave
    /// the deck untouched.
    pub fn decide(&mut self, id: OpportunityId, status: OpportunityStatus) -> Option<&DecisionRecord> {
        let index = self.position_of(id)?;
        let opportunity = self.items.remove(index);
        self.history.push(DecisionRecord {
            opportunity,
            index,
            status,
        });
        self.history.last()
    }

    /// Pops the latest decision and puts its opportunity back at the
    /// recorded index (clamped to the current length).
    pub fn undo(&mut self) -> Option<DecisionRecord> {
        let record = self.history.pop()?;
        if !self.contains(record.opportunity.id) {
            let index = record.index.min(self.items.len());
            self.items.insert(index, record.opportunity.clone());
        }
        Some(record)
    }
}
