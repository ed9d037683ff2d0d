//! Per-round vote tally.

use std::collections::HashSet;

use versus_protocol::{Choice, Counts, ParticipantId, Winner};

/// Counts for the current round plus the set of participants who voted.
///
/// `counts.total()` always equals the number of recorded voters.
#[derive(Debug, Default)]
pub struct VoteTally {
    counts: Counts,
    voted: HashSet<ParticipantId>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the tally for a new round.
    pub fn reset(&mut self) {
        self.counts = Counts::default();
        self.voted.clear();
    }

    /// Records one vote. Returns `false`, changing nothing, if the
    /// participant already voted this round.
    pub fn accept(&mut self, participant: ParticipantId, choice: Choice) -> bool {
        if !self.voted.insert(participant) {
            return false;
        }
        match choice {
            Choice::A => self.counts.a += 1,
            Choice::B => self.counts.b += 1,
        }
        true
    }

    pub fn winner(&self) -> Winner {
        self.counts.winner()
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn voter_count(&self) -> usize {
        self.voted.len()
    }

    pub fn has_voted(&self, participant: &ParticipantId) -> bool {
        self.voted.contains(participant)
    }
}
