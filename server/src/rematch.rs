//! Decides when a finished match restarts.
//!
//! A frozen match restarts only once both players have signalled `ready`.
//! Readiness raised during play means nothing and is discarded every tick, so
//! a stray `ready` cannot pre-arm the next rematch.

use crate::game::Phase;
use crate::input::PlayerSlot;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchDecision {
    Hold,
    Restart,
}

pub fn poll(phase: Phase, left: &PlayerSlot, right: &PlayerSlot) -> RematchDecision {
    match phase {
        Phase::Playing => {
            left.clear_ready();
            right.clear_ready();
            RematchDecision::Hold
        }
        Phase::WinFrozen => match (left.is_ready(), right.is_ready()) {
            (true, true) => {
                left.clear_ready();
                right.clear_ready();
                info!("Both players ready, starting rematch");
                RematchDecision::Restart
            }
            (false, false) => RematchDecision::Hold,
            (l, r) => {
                debug!("Waiting for rematch: left ready {}, right ready {}", l, r);
                RematchDecision::Hold
            }
        },
    }
}
