//! Agent selection strategies

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::aggregates::User;
use crate::domain::value_objects::UserId;
use crate::ports::outbound::AgentSelector;

/// Uniform random pick among candidates.
pub struct RandomAgentSelector {
    rng: Mutex<StdRng>,
}

impl RandomAgentSelector {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Reproducible sequence of picks.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Default for RandomAgentSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSelector for RandomAgentSelector {
    fn select(&self, candidates: &[User]) -> Option<UserId> {
        candidates.choose(&mut *self.rng.lock()).map(|u| u.id.clone())
    }
}

/// Always picks the first candidate.
#[derive(Default)]
pub struct FirstAvailableSelector;

impl AgentSelector for FirstAvailableSelector {
    fn select(&self, candidates: &[User]) -> Option<UserId> {
        candidates.first().map(|u| u.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Role;

    fn agents() -> Vec<User> {
        (0..5).map(|i| User::new(format!("agent-{}", i), "Agent", Role::Agent)).collect()
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let a = RandomAgentSelector::seeded(42);
        let b = RandomAgentSelector::seeded(42);
        let pool = agents();

        let first: Vec<_> = (0..10).map(|_| a.select(&pool)).collect();
        let second: Vec<_> = (0..10).map(|_| b.select(&pool)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|pick| pick.is_some()));
    }

    #[test]
    fn test_empty_pool() {
        assert_eq!(RandomAgentSelector::seeded(1).select(&[]), None);
        assert_eq!(FirstAvailableSelector.select(&[]), None);
    }
}
