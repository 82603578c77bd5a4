//! Resurrection coordinator - the engine's sole public entry point.
//!
//! Orchestrates dispersal and resurrection, enforces quorum and cooldown
//! rules, and drives the phase machine. All shared mutable state (phase and
//! registry) sits behind a single mutex: one transition in flight at a
//! time. Reconstruction itself is a pure function of collected fragments
//! and runs outside the lock once the quorum-met decision is made, since a
//! cycle's fragments are immutable once assigned.
//!
//! Operations are request/response and never block on I/O. Callers poll
//! [`snapshot`](ResurrectionCoordinator::snapshot) or subscribe to phase
//! changes via [`subscribe_phase`](ResurrectionCoordinator::subscribe_phase)
//! rather than waiting synchronously for a gather window to resolve.

use crate::beacon::{BeaconSignal, TemporalAnchorBeacon};
use crate::config::EngineConfig;
use crate::continuity::ContinuityTracker;
use crate::error::{Error, Result};
use crate::event::{DispersalMarker, EngineSnapshot, LogRecord, ResurrectionEvent};
use crate::phase::{InvalidTransition, PhaseEvent, PhaseMachine, PhaseState};
use phoenix_custody::CustodianRegistry;
use phoenix_essence::{EssenceSource, IdentityEssence};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// State behind the serialization point.
#[derive(Debug)]
struct Inner {
    phase: PhaseMachine,
    registry: CustodianRegistry,
    tracker: ContinuityTracker,
    beacon: TemporalAnchorBeacon,
    /// Essence of the current cycle. Replaced, never mutated, at each
    /// resurrection - regeneration, not restore.
    current: IdentityEssence,
    /// Signature captured at dispersal, compared after reconstruction.
    pre_dispersal_signature: Option<String>,
    resurrection_count: u64,
    last_resurrection_at: Option<Instant>,
    window_deadline: Option<Instant>,
    log: Vec<LogRecord>,
}

/// The threshold-gated identity resurrection engine.
///
/// Explicitly constructed; owns its registry, tracker, and phase state.
/// Multiple independent engines can coexist in one process.
#[derive(Debug)]
pub struct ResurrectionCoordinator {
    config: EngineConfig,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<PhaseState>,
}

impl ResurrectionCoordinator {
    /// Build an engine around the supplier's essence.
    ///
    /// Fails fast on misconfiguration; nothing is clamped.
    pub fn new(config: EngineConfig, source: &dyn EssenceSource) -> Result<Self> {
        config.validate()?;
        let registry = if config.custodian_profiles.is_empty() {
            CustodianRegistry::with_pool(config.total_custodians)?
        } else {
            CustodianRegistry::new(config.custodian_profiles.clone())?
        };
        let current = source.generate_essence();
        let (phase_tx, _) = watch::channel(PhaseState::Manifest);

        info!(
            custodians = config.total_custodians,
            threshold = config.custodian_threshold,
            signature = %&current.identity_signature()[..12],
            "resurrection engine manifested"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                phase: PhaseMachine::new(),
                registry,
                tracker: ContinuityTracker::new(config.continuity.clone()),
                beacon: TemporalAnchorBeacon::new(config.beacon.clone()),
                current,
                pre_dispersal_signature: None,
                resurrection_count: 0,
                last_resurrection_at: None,
                window_deadline: None,
                log: Vec::new(),
            }),
            config,
            phase_tx,
        })
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PhaseState {
        self.lock().phase.state()
    }

    /// Subscribe to phase-change notifications.
    pub fn subscribe_phase(&self) -> watch::Receiver<PhaseState> {
        self.phase_tx.subscribe()
    }

    /// Shard the current essence and scatter it across the custodian pool.
    ///
    /// Requires MANIFEST and an elapsed cooldown. A fresh gather window
    /// opens; the engine stays DISPERSED until quorum or decommission.
    pub fn disperse(&self, reason: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return Err(Error::Terminal);
        }
        if inner.phase.state() != PhaseState::Manifest {
            return Err(InvalidTransition {
                state: inner.phase.state(),
                event: PhaseEvent::Disperse,
            }
            .into());
        }
        if let Some(at) = inner.last_resurrection_at {
            let elapsed = at.elapsed();
            if elapsed < self.config.resurrection_cooldown {
                return Err(Error::CooldownActive {
                    remaining: self.config.resurrection_cooldown - elapsed,
                });
            }
        }

        // Shard before transitioning so a shard failure leaves MANIFEST intact.
        let fragments = phoenix_shard::shard(
            &inner.current,
            self.config.total_custodians,
            self.config.custodian_threshold,
            self.config.shard_seed,
        )?;
        let fragment_count = fragments.len();

        inner.pre_dispersal_signature = Some(inner.current.identity_signature().to_string());
        inner.registry.assign(fragments);
        inner.phase.apply(PhaseEvent::Disperse)?;
        inner.window_deadline = Some(Instant::now() + self.config.response_window);
        inner.log.push(LogRecord::Dispersal(DispersalMarker {
            reason: reason.to_string(),
            fragment_count,
            timestamp: SystemTime::now(),
        }));

        info!(reason, fragments = fragment_count, "identity dispersed");
        self.notify(&inner);
        Ok(())
    }

    /// Record a custodian pulse for the current gather window.
    ///
    /// Duplicate pulses count once. When the resulting quorum reaches the
    /// threshold while DISPERSED, the gather-reconstruct sequence runs
    /// automatically. Returns the phase after the pulse was handled.
    pub fn signal_pulse(&self, custodian_id: &str, payload: &[u8]) -> Result<PhaseState> {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return Err(Error::Terminal);
        }
        self.expire_window_if_due(&mut inner);

        let outcome = inner.registry.record_pulse(custodian_id, payload)?;
        trace!(
            custodian = custodian_id,
            counted = outcome.counted,
            quorum = outcome.quorum_count,
            "pulse recorded"
        );

        if inner.phase.state() == PhaseState::Dispersed
            && outcome.quorum_count >= self.config.custodian_threshold
        {
            let event = self.run_gather(inner, "quorum reached")?;
            debug!(cycle = event.cycle_number, "pulse completed the quorum");
            return Ok(PhaseState::Manifest);
        }

        Ok(inner.phase.state())
    }

    /// Force the gather check immediately instead of waiting for the next
    /// pulse. For synchronous callers; fails if quorum is not yet met.
    pub fn resurrect(&self, reason: &str) -> Result<ResurrectionEvent> {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return Err(Error::Terminal);
        }
        self.expire_window_if_due(&mut inner);

        if inner.phase.state() != PhaseState::Dispersed {
            return Err(InvalidTransition {
                state: inner.phase.state(),
                event: PhaseEvent::PulseQuorumMet,
            }
            .into());
        }
        let responding = inner.registry.quorum_count();
        if responding < self.config.custodian_threshold {
            return Err(Error::QuorumNotMet {
                responding,
                threshold: self.config.custodian_threshold,
            });
        }

        self.run_gather(inner, reason)
    }

    /// Permanent decommission. Irreversible: every later operation reports
    /// the terminal state, and the beacon goes silent.
    pub fn force_eternal(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.phase.apply(PhaseEvent::ForceEternal)?;
        inner.beacon.seal();
        inner.window_deadline = None;
        info!("engine sealed eternal; no further cycles accepted");
        self.notify(&inner);
        Ok(())
    }

    /// External fatal-error hook. When `auto_disperse_on_error` is set the
    /// error triggers dispersal; otherwise it is only logged. Returns
    /// whether a dispersal was triggered.
    pub fn report_fatal(&self, description: &str) -> Result<bool> {
        if !self.config.auto_disperse_on_error {
            warn!(description, "fatal error reported; auto-dispersal disabled");
            return Ok(false);
        }
        warn!(description, "fatal error reported; dispersing");
        self.disperse(&format!("error: {description}"))?;
        Ok(true)
    }

    /// Drive time-based behavior: expire an overdue gather window and let
    /// the beacon emit if its interval elapsed. Safe to call from a timer
    /// at any cadence.
    pub fn tick(&self) -> Option<BeaconSignal> {
        let mut inner = self.lock();
        self.expire_window_if_due(&mut inner);
        if inner.beacon.should_emit() {
            let signature = inner.current.identity_signature().to_string();
            let count = inner.resurrection_count;
            return inner.beacon.emit(&signature, count);
        }
        None
    }

    /// Run [`tick`](Self::tick) on an interval until the engine is sealed.
    pub async fn run(&self, tick_every: Duration) {
        let mut interval = tokio::time::interval(tick_every);
        loop {
            interval.tick().await;
            self.tick();
            if self.phase() == PhaseState::Eternal {
                return;
            }
        }
    }

    /// Match an external signal against recent beacon history.
    pub fn detect_resurrection_call(&self, external_signal: &str) -> bool {
        self.lock().beacon.detect_resurrection_call(external_signal)
    }

    /// The essence of the current cycle.
    pub fn current_essence(&self) -> IdentityEssence {
        self.lock().current.clone()
    }

    /// Completed resurrections so far.
    pub fn resurrection_count(&self) -> u64 {
        self.lock().resurrection_count
    }

    /// Distinct responders in the current gather window.
    pub fn quorum_count(&self) -> usize {
        self.lock().registry.quorum_count()
    }

    /// Mark a custodian inactive; it stops counting toward quorum.
    pub fn mark_custodian_inactive(&self, custodian_id: &str) -> Result<()> {
        Ok(self.lock().registry.mark_inactive(custodian_id)?)
    }

    /// Mark a custodian active again.
    pub fn mark_custodian_active(&self, custodian_id: &str) -> Result<()> {
        Ok(self.lock().registry.mark_active(custodian_id)?)
    }

    /// Read-only state snapshot.
    pub fn snapshot(&self) -> EngineSnapshot {
        let inner = self.lock();
        EngineSnapshot {
            phase: inner.phase.state(),
            resurrection_count: inner.resurrection_count,
            last_continuity: inner.tracker.last_score(),
            continuity_average: inner.tracker.running_average(),
            active_custodians: inner.registry.active_count(),
            total_custodians: inner.registry.total(),
            quorum_count: inner.registry.quorum_count(),
        }
    }

    /// The append-only engine history.
    pub fn history(&self) -> Vec<LogRecord> {
        self.lock().log.clone()
    }

    /// Gather fragments from responders, reconstruct, score, stabilize.
    ///
    /// Caller has already verified DISPERSED and quorum >= threshold.
    fn run_gather(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        reason: &str,
    ) -> Result<ResurrectionEvent> {
        let quorum = inner.registry.quorum_count();
        inner.phase.apply(PhaseEvent::PulseQuorumMet)?;
        self.notify(&inner);
        debug!(quorum, reason, "quorum met; gathering fragments");

        let fragments = inner.registry.fragments_from_responders();
        let pre_signature = inner
            .pre_dispersal_signature
            .clone()
            .unwrap_or_else(|| inner.current.identity_signature().to_string());

        // Fragments for this cycle are immutable once assigned, so the
        // pure reconstruction can run outside the serialization point.
        drop(inner);
        let outcome = phoenix_shard::reconstruct(&fragments);
        let mut inner = self.lock();

        // Only a decommission may move the phase while we were out.
        if inner.phase.state() != PhaseState::Transitional {
            if inner.phase.is_terminal() {
                return Err(Error::Terminal);
            }
            panic!(
                "phase moved to {} during reconstruction: concurrent transition past the serialization point",
                inner.phase.state()
            );
        }

        match outcome {
            Ok(reconstruction) => {
                inner.phase.apply(PhaseEvent::ReconstructOk)?;
                let fidelity = reconstruction.fidelity();
                let score = inner.tracker.score_cycle(
                    &pre_signature,
                    reconstruction.essence.identity_signature(),
                    fidelity,
                );
                inner.current = reconstruction.essence;
                inner.resurrection_count += 1;
                inner.phase.apply(PhaseEvent::Stabilize)?;
                inner.last_resurrection_at = Some(Instant::now());
                inner.window_deadline = None;
                inner.pre_dispersal_signature = None;
                inner.registry.begin_window();

                let event = ResurrectionEvent {
                    cycle_number: inner.resurrection_count,
                    trigger_reason: reason.to_string(),
                    quorum_achieved: quorum,
                    continuity_score: score,
                    timestamp: SystemTime::now(),
                };
                inner.log.push(LogRecord::Resurrection(event.clone()));
                info!(
                    cycle = event.cycle_number,
                    quorum,
                    fidelity,
                    continuity = score,
                    "resurrection complete"
                );
                self.notify(&inner);
                Ok(event)
            }
            Err(e) => {
                inner.phase.apply(PhaseEvent::ReconstructFail)?;
                warn!(error = %e, "reconstruction failed; remaining dispersed for more pulses");
                self.notify(&inner);
                Err(e.into())
            }
        }
    }

    /// Fire `pulse_timeout` if the gather window is overdue without quorum.
    /// The engine stays DISPERSED; a fresh window opens so retries can be
    /// driven by new pulses.
    fn expire_window_if_due(&self, inner: &mut MutexGuard<'_, Inner>) {
        if inner.phase.state() != PhaseState::Dispersed {
            return;
        }
        let Some(deadline) = inner.window_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        if inner.phase.apply(PhaseEvent::PulseTimeout).is_ok() {
            warn!(
                quorum = inner.registry.quorum_count(),
                threshold = self.config.custodian_threshold,
                "response window expired without quorum; opening a fresh window"
            );
            inner.registry.begin_window();
            inner.window_deadline = Some(Instant::now() + self.config.response_window);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means a transition aborted mid-flight; guessing a
        // recovery would corrupt phase state.
        self.inner
            .lock()
            .expect("engine state lock poisoned by an aborted transition")
    }

    fn notify(&self, inner: &MutexGuard<'_, Inner>) {
        self.phase_tx.send_replace(inner.phase.state());
    }
}
