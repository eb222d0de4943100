//! Initiative order and round/turn bookkeeping.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::life::Combatant;
use crate::CombatNotice;

/// The turn that just became current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnChange {
    pub round: u32,
    pub index: usize,
    pub combatant: String,
    /// This change crossed into a new round.
    pub new_round: bool,
}

/// Roster plus turn pointer. Combat is active while `turn` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    #[serde(default)]
    combatants: Vec<Combatant>,
    #[serde(default = "first_round")]
    round: u32,
    #[serde(default)]
    turn: Option<usize>,
}

fn first_round() -> u32 {
    1
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            combatants: Vec::new(),
            round: first_round(),
            turn: None,
        }
    }
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An inactive combat with this roster; order is settled by [`start`].
    ///
    /// [`start`]: CombatState::start
    pub fn with_combatants(combatants: Vec<Combatant>) -> Self {
        Self {
            combatants,
            ..Self::default()
        }
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn(&self) -> Option<usize> {
        self.turn
    }

    pub fn is_active(&self) -> bool {
        self.turn.is_some()
    }

    pub fn current(&self) -> Option<&Combatant> {
        self.turn.and_then(|i| self.combatants.get(i))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.combatants.iter().position(|c| c.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    /// Re-establish `round >= 1` and a turn pointer inside the roster after
    /// loading a snapshot from outside.
    pub fn normalize(&mut self) {
        self.round = self.round.max(1);
        self.turn = match self.turn {
            _ if self.combatants.is_empty() => None,
            Some(i) => Some(i.min(self.combatants.len() - 1)),
            None => None,
        };
        for c in &mut self.combatants {
            *c = c.clone().normalized();
        }
    }

    /// Join the roster. During combat the newcomer is slotted by initiative
    /// (after anyone with an equal score) without changing whose turn it is.
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<(), CombatNotice> {
        if self.position(&combatant.id).is_some() {
            return Err(CombatNotice::DuplicateCombatant(combatant.id));
        }
        let combatant = combatant.normalized();
        match self.turn {
            Some(current) => {
                let pos = self
                    .combatants
                    .iter()
                    .position(|c| c.initiative < combatant.initiative)
                    .unwrap_or(self.combatants.len());
                self.combatants.insert(pos, combatant);
                if pos <= current {
                    self.turn = Some(current + 1);
                }
            }
            None => self.combatants.push(combatant),
        }
        Ok(())
    }

    /// Sort by initiative (highest first, ties keep roster order) and begin
    /// round 1 with the first combatant.
    pub fn start(&mut self) -> Result<TurnChange, CombatNotice> {
        if self.combatants.is_empty() {
            return Err(CombatNotice::NoCombatants);
        }
        self.combatants
            .sort_by(|a, b| b.initiative.cmp(&a.initiative));
        self.round = 1;
        self.turn = Some(0);
        let change = self.change(0, true);
        info!(combatant = %change.combatant, "combat started");
        Ok(change)
    }

    pub fn advance(&mut self) -> Result<TurnChange, CombatNotice> {
        let index = self.turn.ok_or(CombatNotice::NotActive)?;
        let last = self.combatants.len().saturating_sub(1);
        let (next, new_round) = if index >= last {
            self.round += 1;
            (0, true)
        } else {
            (index + 1, false)
        };
        self.turn = Some(next);
        let change = self.change(next, new_round);
        info!(
            round = change.round,
            combatant = %change.combatant,
            "turn advanced"
        );
        Ok(change)
    }

    /// Step back one turn. Going back past the first turn of a round returns
    /// to the last turn of the previous round; round 1, turn 0 is the floor.
    pub fn retreat(&mut self) -> Result<TurnChange, CombatNotice> {
        let index = self.turn.ok_or(CombatNotice::NotActive)?;
        let (prev, new_round) = if index > 0 {
            (index - 1, false)
        } else if self.round > 1 {
            self.round -= 1;
            (self.combatants.len() - 1, true)
        } else {
            return Err(CombatNotice::AtFirstTurn);
        };
        self.turn = Some(prev);
        let change = self.change(prev, new_round);
        debug!(
            round = change.round,
            combatant = %change.combatant,
            "turn retreated"
        );
        Ok(change)
    }

    /// End combat; the roster stays.
    pub fn reset(&mut self) {
        self.round = 1;
        self.turn = None;
    }

    /// End combat and empty the roster.
    pub fn clear(&mut self) {
        self.reset();
        self.combatants.clear();
    }

    /// Remove a combatant. Whoever holds the turn keeps it; if that was the
    /// removed combatant the pointer stays on the slot (now the next
    /// combatant), clamped to the end of the roster. An empty roster ends
    /// combat.
    pub fn remove_combatant(&mut self, id: &str) -> Result<Combatant, CombatNotice> {
        let pos = self
            .position(id)
            .ok_or_else(|| CombatNotice::UnknownCombatant(id.to_string()))?;
        let removed = self.combatants.remove(pos);
        if let Some(current) = self.turn {
            if self.combatants.is_empty() {
                self.reset();
            } else if pos < current {
                self.turn = Some(current - 1);
            } else if pos == current {
                self.turn = Some(current.min(self.combatants.len() - 1));
            }
        }
        Ok(removed)
    }

    fn change(&self, index: usize, new_round: bool) -> TurnChange {
        TurnChange {
            round: self.round,
            index,
            combatant: self
                .combatants
                .get(index)
                .map(|c| c.id.clone())
                .unwrap_or_default(),
            new_round,
        }
    }
}
