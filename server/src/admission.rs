//! Role assignment for incoming connections.
//!
//! The first connection takes the left paddle and the second the right one,
//! and both authenticate at the same time. Everything after that waits until
//! both slots are committed and then watches. A slot is only committed once
//! its connection finishes the auth exchange; if the peer drops before then,
//! the slot opens up again for the next arrival.

use shared::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Open,
    Authenticating,
    Taken,
}

#[derive(Debug)]
pub struct AdmissionPolicy {
    left: SlotState,
    right: SlotState,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionPolicy {
    pub fn new() -> Self {
        Self {
            left: SlotState::Open,
            right: SlotState::Open,
        }
    }

    /// State of a player slot. Spectators have no slot and read as `Open`.
    pub fn slot(&self, role: Role) -> SlotState {
        match role {
            Role::Left => self.left,
            Role::Right => self.right,
            Role::Spectator => SlotState::Open,
        }
    }

    /// True once both player slots are committed.
    pub fn players_ready(&self) -> bool {
        self.left == SlotState::Taken && self.right == SlotState::Taken
    }

    /// True while a new connection would get a player slot.
    pub fn has_open_slot(&self) -> bool {
        self.left == SlotState::Open || self.right == SlotState::Open
    }

    /// Assigns a role to a newly accepted connection.
    ///
    /// Returns `None` when both slots are decided but one is still
    /// authenticating; the caller must resolve it with
    /// [`authenticated`](Self::authenticated) or [`abandoned`](Self::abandoned)
    /// before it knows whether the arrival plays or watches.
    pub fn admit(&mut self) -> Option<Role> {
        if self.players_ready() {
            return Some(Role::Spectator);
        }
        if self.left == SlotState::Open {
            self.left = SlotState::Authenticating;
            return Some(Role::Left);
        }
        if self.right == SlotState::Open {
            self.right = SlotState::Authenticating;
            return Some(Role::Right);
        }
        None
    }

    /// Commits a slot whose connection passed auth.
    pub fn authenticated(&mut self, role: Role) {
        if let Some(slot) = self.slot_mut(role) {
            if *slot == SlotState::Authenticating {
                *slot = SlotState::Taken;
            }
        }
    }

    /// Reopens a slot whose connection left during auth.
    pub fn abandoned(&mut self, role: Role) {
        if let Some(slot) = self.slot_mut(role) {
            if *slot == SlotState::Authenticating {
                *slot = SlotState::Open;
            }
        }
    }

    fn slot_mut(&mut self, role: Role) -> Option<&mut SlotState> {
        match role {
            Role::Left => Some(&mut self.left),
            Role::Right => Some(&mut self.right),
            Role::Spectator => None,
        }
    }
}
