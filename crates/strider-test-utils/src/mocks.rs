//! Mock collaborators for testing.
//!
//! Provides a scripted foothold validator, a terrain without normals and a
//! pass-through kinematics model.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use nalgebra::{UnitVector3, Vector3};
use strider_core::{LegId, LegKinematics, TerrainModel};
use strider_planner::{FootholdStatus, FootholdValidator, ValidationRequest, ValidationResponse};

// ---------------------------------------------------------------------------
// ScriptedValidator
// ---------------------------------------------------------------------------

/// Behavior and log of a [`ScriptedValidator`], shared with the test.
#[derive(Debug)]
pub struct ValidatorScript {
    /// Accept submitted requests.
    pub accept: bool,
    /// Status to answer with; `None` never answers.
    pub reply: Option<FootholdStatus>,
    /// Offset added to the requested position in the answer.
    pub offset: Vector3<f64>,
    /// Number of polls before an answer becomes available.
    pub delay_polls: usize,
    pub submitted: Vec<ValidationRequest>,
    /// Cancelled `(leg, step number)` keys, in call order.
    pub cancelled: Vec<(LegId, u64)>,
    #[doc(hidden)]
    pub queue: VecDeque<QueuedResponse>,
}

impl Default for ValidatorScript {
    fn default() -> Self {
        Self {
            accept: true,
            reply: Some(FootholdStatus::Verified),
            offset: Vector3::zeros(),
            delay_polls: 0,
            submitted: Vec::new(),
            cancelled: Vec::new(),
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
#[doc(hidden)]
pub struct QueuedResponse {
    polls_left: usize,
    leg: LegId,
    step_number: u64,
    response: ValidationResponse,
}

/// Validator answering every accepted request according to a script.
#[derive(Clone, Debug, Default)]
pub struct ScriptedValidator {
    script: Rc<RefCell<ValidatorScript>>,
}

impl ScriptedValidator {
    /// Validator plus a handle to inspect and steer it after it was boxed.
    pub fn new(script: ValidatorScript) -> (Self, Rc<RefCell<ValidatorScript>>) {
        let script = Rc::new(RefCell::new(script));
        (
            Self {
                script: Rc::clone(&script),
            },
            script,
        )
    }

    /// Validator that accepts but never answers.
    pub fn silent() -> (Self, Rc<RefCell<ValidatorScript>>) {
        Self::new(ValidatorScript {
            reply: None,
            ..ValidatorScript::default()
        })
    }
}

impl FootholdValidator for ScriptedValidator {
    fn submit(&mut self, request: &ValidationRequest) -> bool {
        let mut script = self.script.borrow_mut();
        if !script.accept {
            return false;
        }
        script.submitted.push(*request);
        if let Some(status) = script.reply {
            let response = ValidationResponse {
                leg_tag: request.leg.tag().to_owned(),
                valid: true,
                position: request.position + script.offset,
                status,
            };
            let polls_left = script.delay_polls;
            script.queue.push_back(QueuedResponse {
                polls_left,
                leg: request.leg,
                step_number: request.step_number,
                response,
            });
        }
        true
    }

    fn poll(&mut self) -> Option<ValidationResponse> {
        let mut script = self.script.borrow_mut();
        let front = script.queue.front_mut()?;
        if front.polls_left > 0 {
            front.polls_left -= 1;
            return None;
        }
        script.queue.pop_front().map(|queued| queued.response)
    }

    fn cancel(&mut self, leg: LegId, step_number: u64) {
        let mut script = self.script.borrow_mut();
        script.cancelled.push((leg, step_number));
        script
            .queue
            .retain(|queued| queued.leg != leg || queued.step_number != step_number);
    }
}

// ---------------------------------------------------------------------------
// NoNormalTerrain
// ---------------------------------------------------------------------------

/// Flat terrain that cannot report surface normals.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNormalTerrain {
    pub height: f64,
}

impl TerrainModel for NoNormalTerrain {
    fn height_at(&self, _position: &Vector3<f64>) -> Option<f64> {
        Some(self.height)
    }

    fn normal_at(&self, _position: &Vector3<f64>) -> Option<UnitVector3<f64>> {
        None
    }
}

// ---------------------------------------------------------------------------
// IdentityKinematics
// ---------------------------------------------------------------------------

/// Returns the base-frame foot position as the joint vector. Points farther
/// than `reach` from the base origin are unreachable.
#[derive(Clone, Copy, Debug)]
pub struct IdentityKinematics {
    pub reach: f64,
}

impl Default for IdentityKinematics {
    fn default() -> Self {
        Self { reach: f64::INFINITY }
    }
}

impl LegKinematics for IdentityKinematics {
    fn joint_positions(&self, _leg: LegId, foot_in_base: &Vector3<f64>) -> Option<Vector3<f64>> {
        (foot_in_base.norm() <= self.reach).then_some(*foot_in_base)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ValidationRequest {
        ValidationRequest {
            leg: LegId::RightFore,
            step_number: 3,
            position: Vector3::new(0.3, -0.2, 0.0),
        }
    }

    #[test]
    fn scripted_validator_answers_after_delay() {
        let (mut validator, script) = ScriptedValidator::new(ValidatorScript {
            delay_polls: 2,
            offset: Vector3::new(0.01, 0.0, 0.0),
            ..ValidatorScript::default()
        });
        assert!(validator.submit(&request()));
        assert!(validator.poll().is_none());
        assert!(validator.poll().is_none());
        let response = validator.poll().unwrap();
        assert_eq!(response.leg_tag, "RF");
        assert!((response.position.x - 0.31).abs() < 1e-12);
        assert_eq!(script.borrow().submitted.len(), 1);
    }

    #[test]
    fn silent_validator_never_answers() {
        let (mut validator, script) = ScriptedValidator::silent();
        assert!(validator.submit(&request()));
        for _ in 0..10 {
            assert!(validator.poll().is_none());
        }
        validator.cancel(LegId::RightFore, 3);
        assert_eq!(script.borrow().cancelled, vec![(LegId::RightFore, 3)]);
    }

    #[test]
    fn cancel_drops_only_matching_request() {
        let (mut validator, script) = ScriptedValidator::new(ValidatorScript::default());
        let other = ValidationRequest {
            leg: LegId::LeftHind,
            step_number: 4,
            ..request()
        };
        assert!(validator.submit(&request()));
        assert!(validator.submit(&other));

        validator.cancel(LegId::RightFore, 3);
        let response = validator.poll().unwrap();
        assert_eq!(response.leg_tag, "LH");
        assert!(validator.poll().is_none());
        assert_eq!(script.borrow().cancelled.len(), 1);
    }

    #[test]
    fn refusing_validator_logs_nothing() {
        let (mut validator, script) = ScriptedValidator::new(ValidatorScript {
            accept: false,
            ..ValidatorScript::default()
        });
        assert!(!validator.submit(&request()));
        assert!(script.borrow().submitted.is_empty());
    }

    #[test]
    fn identity_kinematics_respects_reach() {
        let kinematics = IdentityKinematics { reach: 0.5 };
        let near = Vector3::new(0.25, 0.18, -0.42);
        assert_eq!(kinematics.joint_positions(LegId::LeftFore, &near), Some(near));
        let far = Vector3::new(1.0, 0.0, -0.42);
        assert!(kinematics.joint_positions(LegId::LeftFore, &far).is_none());
    }
}
