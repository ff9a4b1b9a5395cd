//! Optional foothold validation handshake.
//!
//! After a foothold is generated it may be submitted to an external
//! validator (for example a terrain perception service that checks the
//! landing spot). The exchange is a non-blocking submit/poll protocol polled
//! once per control tick. A watchdog and a swing-phase threshold bound the
//! wait: once either fires, the unvalidated candidate is used and the request
//! is cancelled. The control loop never waits on the validator.

use log::{debug, info, warn};
use nalgebra::Vector3;
use strider_core::{LegId, LegTable};

// ---------------------------------------------------------------------------
// Wire contract
// ---------------------------------------------------------------------------

/// Status flag carried by a validation response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FootholdStatus {
    Unknown,
    Freeze,
    Verified,
    Bad,
}

impl FootholdStatus {
    /// Decode the integer wire flag.
    pub const fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            0 => Some(Self::Unknown),
            1 => Some(Self::Freeze),
            2 => Some(Self::Verified),
            3 => Some(Self::Bad),
            _ => None,
        }
    }

    /// The response position replaces the candidate.
    pub const fn adjusts_position(self) -> bool {
        matches!(self, Self::Unknown | Self::Verified)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidationRequest {
    pub leg: LegId,
    pub step_number: u64,
    /// Candidate foothold in world frame.
    pub position: Vector3<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationResponse {
    /// Two-letter leg tag (`LF`, `RF`, `LH`, `RH`).
    pub leg_tag: String,
    pub valid: bool,
    /// Adjusted foothold in world frame.
    pub position: Vector3<f64>,
    pub status: FootholdStatus,
}

/// External foothold validation service.
pub trait FootholdValidator {
    /// Capability flag; a disabled validator is never contacted.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Queue a request. Returns `false` when the request was not accepted.
    fn submit(&mut self, request: &ValidationRequest) -> bool;

    /// Next available response, if any.
    fn poll(&mut self) -> Option<ValidationResponse>;

    /// Drop the outstanding request of `leg` for step `step_number`. Requests
    /// of other legs stay queued.
    fn cancel(&mut self, _leg: LegId, _step_number: u64) {}
}

/// Validator used when no validation service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoValidation;

impl FootholdValidator for NoValidation {
    fn is_enabled(&self) -> bool {
        false
    }

    fn submit(&mut self, _request: &ValidationRequest) -> bool {
        false
    }

    fn poll(&mut self) -> Option<ValidationResponse> {
        None
    }
}

// ---------------------------------------------------------------------------
// Per-leg records
// ---------------------------------------------------------------------------

/// How a foothold's validation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// No validator available; the candidate is used directly.
    Skipped,
    /// The validator replaced the candidate.
    Adjusted(FootholdStatus),
    /// The validator answered but the candidate is kept.
    Kept(FootholdStatus),
    /// No answer in time; the candidate is used.
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakePhase {
    AwaitingSubmission,
    Pending,
    Resolved(ValidationOutcome),
}

/// Planned foothold of one leg for one stance-to-swing cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Foothold {
    pub leg: LegId,
    pub candidate: Vector3<f64>,
    /// Equals `candidate` until the validator adjusts it.
    pub validated: Vector3<f64>,
    pub step_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootholdRecord {
    pub foothold: Foothold,
    pub phase: HandshakePhase,
    /// Time spent waiting for validation (s).
    pub elapsed: f64,
}

impl FootholdRecord {
    pub const fn is_resolved(&self) -> bool {
        matches!(self.phase, HandshakePhase::Resolved(_))
    }

    /// Foothold to swing towards, once validation is resolved.
    pub const fn resolved_target(&self) -> Option<Vector3<f64>> {
        if self.is_resolved() {
            Some(self.foothold.validated)
        } else {
            None
        }
    }

    pub const fn outcome(&self) -> Option<ValidationOutcome> {
        match self.phase {
            HandshakePhase::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Validator plus one optional foothold record per leg.
pub struct ValidationHandshake {
    validator: Box<dyn FootholdValidator>,
    records: LegTable<Option<FootholdRecord>>,
    timeout: f64,
    abandon_swing_phase: f64,
    requests_sent: u64,
}

impl ValidationHandshake {
    pub fn new(validator: Box<dyn FootholdValidator>, timeout: f64, abandon_swing_phase: f64) -> Self {
        Self {
            validator,
            records: LegTable::default(),
            timeout,
            abandon_swing_phase,
            requests_sent: 0,
        }
    }

    pub fn set_limits(&mut self, timeout: f64, abandon_swing_phase: f64) {
        self.timeout = timeout;
        self.abandon_swing_phase = abandon_swing_phase;
    }

    pub fn record(&self, leg: LegId) -> Option<&FootholdRecord> {
        self.records[leg].as_ref()
    }

    /// Total requests accepted by the validator.
    pub const fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Start the handshake for a new foothold, replacing any previous record
    /// of the leg. Returns the record's validated position when it resolves
    /// immediately (no validator).
    pub fn open(&mut self, foothold: Foothold) -> Option<Vector3<f64>> {
        let leg = foothold.leg;
        if let Some(previous) = self.records[leg] {
            if previous.phase == HandshakePhase::Pending {
                self.validator.cancel(leg, previous.foothold.step_number);
            }
        }
        let phase = if self.validator.is_enabled() {
            HandshakePhase::AwaitingSubmission
        } else {
            HandshakePhase::Resolved(ValidationOutcome::Skipped)
        };
        self.records[leg] = Some(FootholdRecord {
            foothold,
            phase,
            elapsed: 0.0,
        });
        matches!(phase, HandshakePhase::Resolved(_)).then_some(foothold.validated)
    }

    /// Advance every open handshake by one tick: submit, drain responses,
    /// then apply the watchdog and the swing-phase threshold.
    ///
    /// Returns the footholds resolved during this tick.
    pub fn poll(&mut self, dt: f64, swing_phases: &LegTable<f64>) -> Vec<Foothold> {
        let mut resolved = Vec::new();

        for (leg, slot) in self.records.iter_mut() {
            let Some(record) = slot else { continue };
            if record.phase != HandshakePhase::AwaitingSubmission {
                continue;
            }
            let request = ValidationRequest {
                leg,
                step_number: record.foothold.step_number,
                position: record.foothold.candidate,
            };
            if self.validator.submit(&request) {
                debug!("{leg}: validation request for step {}", request.step_number);
                record.phase = HandshakePhase::Pending;
                self.requests_sent += 1;
            }
        }

        while let Some(response) = self.validator.poll() {
            if let Some(foothold) = self.apply_response(&response) {
                resolved.push(foothold);
            }
        }

        for (leg, slot) in self.records.iter_mut() {
            let Some(record) = slot else { continue };
            if record.is_resolved() {
                continue;
            }
            record.elapsed += dt;
            let late = swing_phases[leg] >= self.abandon_swing_phase;
            if late || record.elapsed >= self.timeout {
                if record.phase == HandshakePhase::Pending {
                    self.validator.cancel(leg, record.foothold.step_number);
                }
                warn!(
                    "{leg}: foothold validation abandoned after {:.3}s (swing phase {:.2}), using candidate",
                    record.elapsed, swing_phases[leg]
                );
                record.foothold.validated = record.foothold.candidate;
                record.phase = HandshakePhase::Resolved(ValidationOutcome::Abandoned);
                resolved.push(record.foothold);
            }
        }

        resolved
    }

    /// Finalize the leg's foothold at touchdown.
    pub fn close(&mut self, leg: LegId) -> Option<FootholdRecord> {
        let record = self.records[leg].take()?;
        if record.phase == HandshakePhase::Pending {
            self.validator.cancel(leg, record.foothold.step_number);
            debug!("{leg}: touchdown with validation still pending");
        }
        Some(record)
    }

    fn apply_response(&mut self, response: &ValidationResponse) -> Option<Foothold> {
        if !response.valid {
            debug!("ignoring invalid validation response for {}", response.leg_tag);
            return None;
        }
        let Some(leg) = LegId::from_tag(&response.leg_tag) else {
            warn!("validation response with unknown leg tag {:?}", response.leg_tag);
            return None;
        };
        let record = self.records[leg].as_mut()?;
        if record.phase != HandshakePhase::Pending {
            debug!("{leg}: stale validation response ignored");
            return None;
        }

        let outcome = if response.status.adjusts_position() {
            record.foothold.validated = response.position;
            ValidationOutcome::Adjusted(response.status)
        } else {
            record.foothold.validated = record.foothold.candidate;
            ValidationOutcome::Kept(response.status)
        };
        info!(
            "{leg}: foothold {:?} after {:.3}s, offset {:.3} m",
            outcome,
            record.elapsed,
            (record.foothold.validated - record.foothold.candidate).norm()
        );
        record.phase = HandshakePhase::Resolved(outcome);
        Some(record.foothold)
    }
}
