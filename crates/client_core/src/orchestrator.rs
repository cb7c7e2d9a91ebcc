//! Draw workflow: spin, pick, confirm, assign, notify.
//!
//! Every transition happens under the machine lock before any gateway call is
//! awaited, so an operation that finds the machine in the wrong phase is
//! ignored instead of starting a second overlapping call. Nothing in flight is
//! ever cancelled.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use shared::{
    domain::EntrantId,
    protocol::{Entrant, PrizeTier},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinError,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    dialog::{tier_choices, ConfirmationDialog, DialogError, Resolution, TierChoice},
    gateway::{DrawGateway, GatewayError, NotificationReceipt},
};

pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_millis(3000);
const MIN_SPIN_TURNS: f64 = 5.0;
const MAX_SPIN_TURNS: f64 = 8.0;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinTiming {
    duration: Duration,
    min_turns: f64,
    max_turns: f64,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SPIN_DURATION,
            min_turns: MIN_SPIN_TURNS,
            max_turns: MAX_SPIN_TURNS,
        }
    }
}

impl SpinTiming {
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Sets the range of full wheel turns added per spin. Bounds that are not
    /// finite and non-negative are ignored; reversed bounds are swapped.
    pub fn with_turns(self, min_turns: f64, max_turns: f64) -> Self {
        let valid = |turns: f64| turns.is_finite() && turns >= 0.0;
        if !valid(min_turns) || !valid(max_turns) {
            warn!(min_turns, max_turns, "ignoring invalid spin turn range");
            return self;
        }
        Self {
            min_turns: min_turns.min(max_turns),
            max_turns: min_turns.max(max_turns),
            ..self
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn random_turns(&self) -> f64 {
        if self.max_turns <= self.min_turns {
            return self.min_turns;
        }
        rand::rng().random_range(self.min_turns..self.max_turns)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWinner {
    pub entrant: Entrant,
    pub drawn_at: DateTime<Utc>,
}

impl PendingWinner {
    pub fn id(&self) -> EntrantId {
        self.entrant.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { recipient: String },
    Deferred { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub winner: Entrant,
    pub place: u32,
    pub delivery: DeliveryOutcome,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    fn new(winner: Entrant, place: u32, receipt: NotificationReceipt) -> Self {
        let delivery = if receipt.delivered {
            DeliveryOutcome::Delivered {
                recipient: receipt.recipient.unwrap_or_else(|| winner.email.clone()),
            }
        } else {
            DeliveryOutcome::Deferred {
                message: receipt.message,
            }
        };
        Self {
            winner,
            place,
            delivery,
            settled_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        match &self.delivery {
            DeliveryOutcome::Delivered { recipient } => {
                format!("Winner marked! Notification sent to {recipient}")
            }
            DeliveryOutcome::Deferred { message } => format!("Winner marked! {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    WaitForEntrants,
    SpinAgain,
    ResendNotification,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawFailure {
    #[error("No eligible entrants left in the draw ({detail}). Collect more feedback before spinning again.")]
    NoEligibleEntrants { detail: String },
    #[error("Failed to select a winner: {reason}")]
    FetchFailed { reason: GatewayError },
    #[error("Failed to mark {name} as winner: {reason}. Spin again to draw a new winner.")]
    AssignmentFailed {
        entrant_id: EntrantId,
        name: String,
        reason: GatewayError,
    },
    #[error("{} was recorded as the winner for place {place}, but the notification failed: {reason}. Re-send the notification; do not draw again.", .winner.name)]
    NotificationFailed {
        winner: Entrant,
        place: u32,
        reason: GatewayError,
    },
}

impl DrawFailure {
    fn from_fetch(error: GatewayError) -> Self {
        match error {
            GatewayError::NoEligibleEntrants { detail } => DrawFailure::NoEligibleEntrants { detail },
            reason => DrawFailure::FetchFailed { reason },
        }
    }

    pub fn retry_hint(&self) -> RetryHint {
        match self {
            DrawFailure::NoEligibleEntrants { .. } => RetryHint::WaitForEntrants,
            DrawFailure::FetchFailed { .. } | DrawFailure::AssignmentFailed { .. } => {
                RetryHint::SpinAgain
            }
            DrawFailure::NotificationFailed { .. } => RetryHint::ResendNotification,
        }
    }

    /// True when the winner is already persisted and only notification is missing.
    pub fn winner_recorded(&self) -> bool {
        matches!(self, DrawFailure::NotificationFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Idle,
    Spinning,
    PendingConfirmation,
    Assigning,
    Notifying,
    Settled,
    Errored,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Idle => "idle",
            PhaseKind::Spinning => "spinning",
            PhaseKind::PendingConfirmation => "pending_confirmation",
            PhaseKind::Assigning => "assigning",
            PhaseKind::Notifying => "notifying",
            PhaseKind::Settled => "settled",
            PhaseKind::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawPhase {
    Idle,
    Spinning,
    PendingConfirmation {
        winner: PendingWinner,
        dialog: ConfirmationDialog,
    },
    Assigning {
        winner: PendingWinner,
        dialog: ConfirmationDialog,
    },
    Notifying {
        winner: Entrant,
        resolution: Resolution,
    },
    Settled(Settlement),
    Errored(DrawFailure),
}

impl DrawPhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            DrawPhase::Idle => PhaseKind::Idle,
            DrawPhase::Spinning => PhaseKind::Spinning,
            DrawPhase::PendingConfirmation { .. } => PhaseKind::PendingConfirmation,
            DrawPhase::Assigning { .. } => PhaseKind::Assigning,
            DrawPhase::Notifying { .. } => PhaseKind::Notifying,
            DrawPhase::Settled(_) => PhaseKind::Settled,
            DrawPhase::Errored(_) => PhaseKind::Errored,
        }
    }

    fn accepts_spin(&self) -> bool {
        matches!(
            self,
            DrawPhase::Idle | DrawPhase::Settled(_) | DrawPhase::Errored(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawSnapshot {
    pub phase: DrawPhase,
    /// Accumulated wheel angle in degrees.
    pub rotation_degrees: f64,
}

impl DrawSnapshot {
    pub fn kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn pending_winner(&self) -> Option<&PendingWinner> {
        match &self.phase {
            DrawPhase::PendingConfirmation { winner, .. } | DrawPhase::Assigning { winner, .. } => {
                Some(winner)
            }
            _ => None,
        }
    }

    pub fn dialog(&self) -> Option<&ConfirmationDialog> {
        match &self.phase {
            DrawPhase::PendingConfirmation { dialog, .. } | DrawPhase::Assigning { dialog, .. } => {
                Some(dialog)
            }
            _ => None,
        }
    }

    pub fn displayed_winner(&self) -> Option<&Settlement> {
        match &self.phase {
            DrawPhase::Settled(settlement) => Some(settlement),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&DrawFailure> {
        match &self.phase {
            DrawPhase::Errored(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DrawEvent {
    PhaseChanged(PhaseKind),
    /// Winner and notification outcome are final; listings should re-query.
    Settled(Settlement),
    Failed(DrawFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpinOutcome {
    /// Another operation owns the machine; nothing was started.
    Ignored(PhaseKind),
    Drawn(PendingWinner),
    Failed(DrawFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Ignored(PhaseKind),
    Rejected(DialogError),
    Settled(Settlement),
    Failed(DrawFailure),
}

struct DrawMachine {
    phase: DrawPhase,
    tiers: Vec<TierChoice>,
    rotation_degrees: f64,
}

/// State shared between the orchestrator handle and the tasks that carry
/// gateway calls.
struct DrawCore {
    gateway: Arc<dyn DrawGateway>,
    timing: SpinTiming,
    machine: Mutex<DrawMachine>,
    events: broadcast::Sender<DrawEvent>,
}

/// Drives one draw at a time.
///
/// Gateway calls run on their own tokio task, so a caller that stops waiting
/// (a timeout, a cancelled UI task) does not leave the machine stuck in
/// `Spinning`, `Assigning` or `Notifying`: the task still finishes and moves
/// the phase on.
pub struct DrawOrchestrator {
    core: Arc<DrawCore>,
}

impl DrawOrchestrator {
    pub fn new(gateway: Arc<dyn DrawGateway>) -> Self {
        Self::with_timing(gateway, SpinTiming::default())
    }

    pub fn with_timing(gateway: Arc<dyn DrawGateway>, timing: SpinTiming) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            core: Arc::new(DrawCore {
                gateway,
                timing,
                machine: Mutex::new(DrawMachine {
                    phase: DrawPhase::Idle,
                    tiers: tier_choices(&[]),
                    rotation_degrees: 0.0,
                }),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrawEvent> {
        self.core.events.subscribe()
    }

    pub async fn snapshot(&self) -> DrawSnapshot {
        let machine = self.core.machine.lock().await;
        DrawSnapshot {
            phase: machine.phase.clone(),
            rotation_degrees: machine.rotation_degrees,
        }
    }

    /// Tiers offered by dialogs opened after this call.
    pub async fn set_prize_tiers(&self, tiers: &[PrizeTier]) {
        let choices = tier_choices(tiers);
        self.core.machine.lock().await.tiers = choices;
    }

    /// Starts a draw from `Idle`, `Settled` or `Errored`.
    ///
    /// The fetch and the animation timer run together; the drawn entrant is
    /// revealed only after both finish. A failed fetch errors out at once.
    pub async fn spin(&self) -> SpinOutcome {
        {
            let mut machine = self.core.machine.lock().await;
            if !machine.phase.accepts_spin() {
                let kind = machine.phase.kind();
                debug!(phase = %kind, "spin ignored");
                return SpinOutcome::Ignored(kind);
            }
            machine.rotation_degrees += self.core.timing.random_turns() * 360.0;
            self.core.enter(&mut machine, DrawPhase::Spinning);
        }

        let reveal_at = Instant::now() + self.core.timing.duration;
        let core = Arc::clone(&self.core);
        match tokio::spawn(core.reveal(reveal_at)).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let failure = DrawFailure::FetchFailed {
                    reason: task_stopped(error),
                };
                self.core.fail_now(failure.clone()).await;
                SpinOutcome::Failed(failure)
            }
        }
    }

    /// Changes the selected tier of the open dialog. Never touches the gateway.
    pub async fn select_tier(&self, place: u32) -> Result<(), DialogError> {
        let mut machine = self.core.machine.lock().await;
        match &mut machine.phase {
            DrawPhase::PendingConfirmation { dialog, .. } => dialog.select_tier(place),
            _ => Err(DialogError::Locked),
        }
    }

    pub async fn send_now(&self) -> ConfirmOutcome {
        self.resolve(None, true).await
    }

    pub async fn send_later(&self) -> ConfirmOutcome {
        self.resolve(None, false).await
    }

    /// Selects `place` and resolves the dialog in one step.
    pub async fn confirm(&self, place: u32, send_now: bool) -> ConfirmOutcome {
        self.resolve(Some(place), send_now).await
    }

    /// Re-sends the notification for a winner whose assignment is already
    /// recorded. Only valid after a notification failure.
    pub async fn retry_notification(&self, send_now: bool) -> ConfirmOutcome {
        let (winner, resolution) = {
            let mut machine = self.core.machine.lock().await;
            let (winner, place) = match &machine.phase {
                DrawPhase::Errored(DrawFailure::NotificationFailed { winner, place, .. }) => {
                    (winner.clone(), *place)
                }
                other => return ConfirmOutcome::Ignored(other.kind()),
            };
            let resolution = Resolution { place, send_now };
            self.core.enter(
                &mut machine,
                DrawPhase::Notifying {
                    winner: winner.clone(),
                    resolution,
                },
            );
            (winner, resolution)
        };

        info!(entrant_id = %winner.id, send_now, "re-sending winner notification");
        let core = Arc::clone(&self.core);
        let task = tokio::spawn({
            let winner = winner.clone();
            async move { core.notify(winner, resolution).await }
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(error) => {
                let failure = DrawFailure::NotificationFailed {
                    winner,
                    place: resolution.place,
                    reason: task_stopped(error),
                };
                self.core.fail_now(failure.clone()).await;
                ConfirmOutcome::Failed(failure)
            }
        }
    }

    async fn resolve(&self, place: Option<u32>, send_now: bool) -> ConfirmOutcome {
        let (winner, resolution) = {
            let mut machine = self.core.machine.lock().await;
            let (winner, mut dialog) =
                match std::mem::replace(&mut machine.phase, DrawPhase::Idle) {
                    DrawPhase::PendingConfirmation { winner, dialog } => (winner, dialog),
                    other => {
                        let kind = other.kind();
                        machine.phase = other;
                        debug!(phase = %kind, "dialog resolution ignored");
                        return ConfirmOutcome::Ignored(kind);
                    }
                };

            if let Some(place) = place {
                if let Err(error) = dialog.select_tier(place) {
                    machine.phase = DrawPhase::PendingConfirmation { winner, dialog };
                    return ConfirmOutcome::Rejected(error);
                }
            }
            let Some(resolution) = dialog.begin_resolution(send_now) else {
                machine.phase = DrawPhase::PendingConfirmation { winner, dialog };
                return ConfirmOutcome::Ignored(PhaseKind::PendingConfirmation);
            };

            self.core.enter(
                &mut machine,
                DrawPhase::Assigning {
                    winner: winner.clone(),
                    dialog,
                },
            );
            (winner, resolution)
        };

        let core = Arc::clone(&self.core);
        match tokio::spawn(core.assign_and_notify(winner.clone(), resolution)).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let failure = DrawFailure::AssignmentFailed {
                    entrant_id: winner.id(),
                    name: winner.entrant.name,
                    reason: task_stopped(error),
                };
                self.core.fail_now(failure.clone()).await;
                ConfirmOutcome::Failed(failure)
            }
        }
    }
}

fn task_stopped(error: JoinError) -> GatewayError {
    warn!(%error, "draw task stopped before finishing");
    GatewayError::Transport(format!("draw task stopped: {error}"))
}

impl DrawCore {
    async fn reveal(self: Arc<Self>, reveal_at: Instant) -> SpinOutcome {
        let entrant = match self.gateway.fetch_random_eligible().await {
            Ok(entrant) => entrant,
            Err(error) => {
                warn!(%error, "random entrant fetch failed");
                let failure = DrawFailure::from_fetch(error);
                self.fail_now(failure.clone()).await;
                return SpinOutcome::Failed(failure);
            }
        };

        tokio::time::sleep_until(reveal_at).await;

        let pending = PendingWinner {
            entrant,
            drawn_at: Utc::now(),
        };
        let mut machine = self.machine.lock().await;
        let dialog = ConfirmationDialog::new(machine.tiers.clone());
        info!(entrant_id = %pending.id(), "entrant drawn, awaiting confirmation");
        self.enter(
            &mut machine,
            DrawPhase::PendingConfirmation {
                winner: pending.clone(),
                dialog,
            },
        );
        SpinOutcome::Drawn(pending)
    }

    async fn assign_and_notify(
        self: Arc<Self>,
        winner: PendingWinner,
        resolution: Resolution,
    ) -> ConfirmOutcome {
        info!(
            entrant_id = %winner.id(),
            place = resolution.place,
            send_now = resolution.send_now,
            "assigning winner"
        );
        let assigned = match self
            .gateway
            .assign_winner(winner.id(), resolution.place)
            .await
        {
            Ok(entrant) => entrant,
            Err(reason) => {
                warn!(entrant_id = %winner.id(), error = %reason, "winner assignment failed");
                let failure = DrawFailure::AssignmentFailed {
                    entrant_id: winner.id(),
                    name: winner.entrant.name,
                    reason,
                };
                self.fail_now(failure.clone()).await;
                return ConfirmOutcome::Failed(failure);
            }
        };

        if !assigned.has_consistent_winner_fields() || assigned.winner_place != Some(resolution.place)
        {
            warn!(
                entrant_id = %assigned.id,
                winner_place = ?assigned.winner_place,
                is_winner = assigned.is_winner,
                "assignment response does not reflect the requested place"
            );
        }

        {
            let mut machine = self.machine.lock().await;
            self.enter(
                &mut machine,
                DrawPhase::Notifying {
                    winner: assigned.clone(),
                    resolution,
                },
            );
        }
        self.notify(assigned, resolution).await
    }

    async fn notify(&self, winner: Entrant, resolution: Resolution) -> ConfirmOutcome {
        let sent = self
            .gateway
            .send_notification(winner.id, resolution.send_now)
            .await;

        let mut machine = self.machine.lock().await;
        match sent {
            Ok(receipt) => {
                let settlement = Settlement::new(winner, resolution.place, receipt);
                info!(
                    entrant_id = %settlement.winner.id,
                    place = settlement.place,
                    delivered = matches!(settlement.delivery, DeliveryOutcome::Delivered { .. }),
                    "draw settled"
                );
                self.enter(&mut machine, DrawPhase::Settled(settlement.clone()));
                let _ = self.events.send(DrawEvent::Settled(settlement.clone()));
                ConfirmOutcome::Settled(settlement)
            }
            Err(reason) => {
                warn!(
                    entrant_id = %winner.id,
                    error = %reason,
                    "winner notification failed; assignment stays recorded"
                );
                let failure = DrawFailure::NotificationFailed {
                    winner,
                    place: resolution.place,
                    reason,
                };
                self.fail(&mut machine, failure.clone());
                ConfirmOutcome::Failed(failure)
            }
        }
    }

    fn enter(&self, machine: &mut DrawMachine, phase: DrawPhase) {
        let kind = phase.kind();
        debug!(phase = %kind, "draw phase transition");
        machine.phase = phase;
        let _ = self.events.send(DrawEvent::PhaseChanged(kind));
    }

    fn fail(&self, machine: &mut DrawMachine, failure: DrawFailure) {
        self.enter(machine, DrawPhase::Errored(failure.clone()));
        let _ = self.events.send(DrawEvent::Failed(failure));
    }

    async fn fail_now(&self, failure: DrawFailure) {
        let mut machine = self.machine.lock().await;
        self.fail(&mut machine, failure);
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
