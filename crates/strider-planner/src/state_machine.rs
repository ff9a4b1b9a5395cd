//! Per-leg discrete locomotion mode.
//!
//! The mode combines the scheduled phase of the leg with the contact and
//! slip flags reported by the contact event detector. It only selects which
//! planning branch runs for the leg; it does not detect contact itself.

use log::debug;
use strider_core::LegId;

use crate::leg::LegRuntimeState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegMode {
    SwingNormal,
    /// Scheduled to swing but the foot is still on the ground.
    SwingLateLiftOff,
    StanceNormal,
    StanceSlipping,
    StanceLostContact,
}

/// Planning branch selected by a [`LegMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegAction {
    FollowSwingTrajectory,
    RegainContact,
    Hold,
}

impl LegMode {
    pub const fn is_swing(self) -> bool {
        matches!(self, Self::SwingNormal | Self::SwingLateLiftOff)
    }

    pub const fn is_stance(self) -> bool {
        !self.is_swing()
    }

    pub const fn needs_contact_regain(self) -> bool {
        matches!(self, Self::StanceSlipping | Self::StanceLostContact)
    }

    pub const fn action(self) -> LegAction {
        match self {
            Self::SwingNormal | Self::SwingLateLiftOff => LegAction::FollowSwingTrajectory,
            Self::StanceSlipping | Self::StanceLostContact => LegAction::RegainContact,
            Self::StanceNormal => LegAction::Hold,
        }
    }
}

/// A mode change observed during one update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: LegMode,
    pub to: LegMode,
}

impl Transition {
    pub const fn is_liftoff(&self) -> bool {
        self.from.is_stance() && self.to.is_swing()
    }

    pub const fn is_touchdown(&self) -> bool {
        self.from.is_swing() && self.to.is_stance()
    }

    /// Entering a contact-regain mode from a mode without regain.
    pub const fn starts_contact_regain(&self) -> bool {
        !self.from.needs_contact_regain() && self.to.needs_contact_regain()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LegStateMachine {
    leg: LegId,
    mode: LegMode,
}

impl LegStateMachine {
    /// Initial mode from sensed contact at startup.
    pub const fn new(leg: LegId, grounded: bool) -> Self {
        let mode = if grounded {
            LegMode::StanceNormal
        } else {
            LegMode::StanceLostContact
        };
        Self { leg, mode }
    }

    pub const fn mode(&self) -> LegMode {
        self.mode
    }

    /// Step the machine with this tick's scheduled phase and contact flags.
    pub fn update(&mut self, state: &LegRuntimeState) -> Option<Transition> {
        let grounded = state.is_grounded();
        let next = if state.is_scheduled_stance() {
            if grounded && state.measurement.slipping {
                LegMode::StanceSlipping
            } else if grounded {
                LegMode::StanceNormal
            } else {
                LegMode::StanceLostContact
            }
        } else {
            match self.mode {
                LegMode::SwingNormal => LegMode::SwingNormal,
                _ if grounded => LegMode::SwingLateLiftOff,
                _ => LegMode::SwingNormal,
            }
        };

        if next == self.mode {
            return None;
        }
        debug!("{}: {:?} -> {:?}", self.leg, self.mode, next);
        let transition = Transition {
            from: self.mode,
            to: next,
        };
        self.mode = next;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_core::LegMeasurement;

    fn walking_leg(grounded: bool, slipping: bool, stance: f64, swing: f64) -> LegRuntimeState {
        let mut leg = LegRuntimeState::new(LegId::LeftFore, LegMeasurement::default());
        leg.in_stand_configuration = false;
        leg.update(
            LegMeasurement {
                grounded,
                slipping,
                ..Default::default()
            },
            stance,
            swing,
        );
        leg
    }

    #[test]
    fn initial_mode_from_contact() {
        assert_eq!(
            LegStateMachine::new(LegId::LeftFore, true).mode(),
            LegMode::StanceNormal
        );
        assert_eq!(
            LegStateMachine::new(LegId::LeftFore, false).mode(),
            LegMode::StanceLostContact
        );
    }

    #[test]
    fn late_liftoff_then_swing() {
        let mut sm = LegStateMachine::new(LegId::LeftFore, true);

        let t = sm.update(&walking_leg(true, false, -1.0, 0.05)).unwrap();
        assert_eq!(t.to, LegMode::SwingLateLiftOff);
        assert!(t.is_liftoff());

        let t = sm.update(&walking_leg(false, false, -1.0, 0.1)).unwrap();
        assert_eq!(t.to, LegMode::SwingNormal);
        assert!(!t.is_liftoff());

        // Early contact during swing does not leave SwingNormal.
        assert!(sm.update(&walking_leg(true, false, -1.0, 0.9)).is_none());
        assert_eq!(sm.mode().action(), LegAction::FollowSwingTrajectory);
    }

    #[test]
    fn touchdown_without_contact_regains() {
        let mut sm = LegStateMachine::new(LegId::LeftFore, true);
        sm.update(&walking_leg(false, false, -1.0, 0.5));
        let t = sm.update(&walking_leg(false, false, 0.01, -1.0)).unwrap();
        assert!(t.is_touchdown());
        assert!(t.starts_contact_regain());
        assert_eq!(sm.mode().action(), LegAction::RegainContact);

        let t = sm.update(&walking_leg(true, false, 0.05, -1.0)).unwrap();
        assert_eq!(t.to, LegMode::StanceNormal);
        assert_eq!(sm.mode().action(), LegAction::Hold);
    }

    #[test]
    fn slipping_stance_leg() {
        let mut sm = LegStateMachine::new(LegId::LeftFore, true);
        let t = sm.update(&walking_leg(true, true, 0.5, -1.0)).unwrap();
        assert_eq!(t.to, LegMode::StanceSlipping);
        assert!(t.starts_contact_regain());

        // Slip turning into lost contact keeps the regain running.
        let t = sm.update(&walking_leg(false, false, 0.55, -1.0)).unwrap();
        assert_eq!(t.to, LegMode::StanceLostContact);
        assert!(!t.starts_contact_regain());
    }
}
