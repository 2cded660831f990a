//! # Machine Instances
//!
//! A live, in-memory state machine for one calculation. Each running instance owns a
//! command processor task that receives events over an mpsc channel and answers through
//! a oneshot responder, so events for one machine are evaluated strictly in arrival
//! order while different machines proceed in parallel.
//!
//! ## Lifecycle
//!
//! ```text
//! Created --restore--> Stopped --start--> Running --stop--> Stopped
//!                                            \
//!                                             --release--> Released
//! ```
//!
//! Start and stop both wait for a one-shot acknowledgement from the processor task,
//! bounded by `engine.lifecycle_timeout_ms`. Transitions between phases are serialized
//! by the instance's own async mutex.
//!
//! `Released` is terminal: a released instance, or one whose activation failed, never
//! runs again. Callers that still hold it get [`StateMachineError::MachineReleased`]
//! and must acquire a fresh instance.

use super::composite::ActiveStateSet;
use super::definition::WorkflowDefinition;
use super::errors::{internal_error, StateMachineError, StateMachineResult};
use super::events::EventId;
use super::persistence::StatusPersister;
use super::states::StateId;
use crate::config::EngineConfig;
use crate::logging::log_machine_operation;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Machine command responder type
type CommandResponder<T> = oneshot::Sender<StateMachineResult<T>>;

/// Commands handled by a machine's processor task
#[derive(Debug)]
pub enum MachineCommand {
    /// Evaluate an event and persist every resulting step
    SendEvent {
        event: EventId,
        resp: CommandResponder<EventOutcome>,
    },
    /// Stop processing; answered once no further event will be evaluated
    Stop { resp: CommandResponder<()> },
}

/// Answer to an event sent to a machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub accepted: bool,
    /// Active states after evaluation, main region first
    pub states: Vec<StateId>,
}

#[derive(Debug)]
enum Lifecycle {
    Created,
    Stopped,
    Released,
    Running {
        commands: mpsc::Sender<MachineCommand>,
        handle: JoinHandle<()>,
    },
}

/// Live state machine for a single calculation
pub struct MachineInstance {
    machine_id: String,
    definition: Arc<WorkflowDefinition>,
    persister: StatusPersister,
    states: Arc<RwLock<ActiveStateSet>>,
    lifecycle: Mutex<Lifecycle>,
    running: AtomicBool,
    config: EngineConfig,
}

impl std::fmt::Debug for MachineInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineInstance")
            .field("machine_id", &self.machine_id)
            .field("workflow", &self.definition.name())
            .field("states", &self.states.read().to_string())
            .field("running", &self.is_running())
            .finish()
    }
}

impl MachineInstance {
    /// Create an instance in the `Created` phase, positioned on the initial state
    pub fn new(
        machine_id: impl Into<String>,
        definition: Arc<WorkflowDefinition>,
        persister: StatusPersister,
        config: EngineConfig,
    ) -> Self {
        let states = definition.initial_states();
        Self {
            machine_id: machine_id.into(),
            definition,
            persister,
            states: Arc::new(RwLock::new(states)),
            lifecycle: Mutex::new(Lifecycle::Created),
            running: AtomicBool::new(false),
            config,
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn active_states(&self) -> ActiveStateSet {
        self.states.read().clone()
    }

    /// Active states flattened main first, then secondaries in declared order
    pub fn current_states(&self) -> Vec<StateId> {
        self.definition.ordered_states(&self.states.read())
    }

    /// Restore on first use, then start if not already running.
    ///
    /// A failed activation releases the instance.
    pub async fn activate(&self) -> StateMachineResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        match *lifecycle {
            Lifecycle::Released => return Err(self.released()),
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Created | Lifecycle::Stopped => {}
        }

        let needs_restore = matches!(*lifecycle, Lifecycle::Created);
        let result = if needs_restore {
            match self.restore_locked(&mut lifecycle).await {
                Ok(()) => self.start_locked(&mut lifecycle).await,
                Err(err) => Err(err),
            }
        } else {
            self.start_locked(&mut lifecycle).await
        };

        if result.is_err() {
            *lifecycle = Lifecycle::Released;
            self.running.store(false, Ordering::Release);
        }
        result
    }

    /// Stop if running and move to the terminal `Released` phase
    pub async fn release(&self) -> StateMachineResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let result = self.stop_locked(&mut lifecycle).await;
        *lifecycle = Lifecycle::Released;
        result
    }

    pub async fn is_released(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Released)
    }

    /// Stop if running and reload state from the status store.
    ///
    /// Leaves the instance stopped; call [`activate`](Self::activate) to resume.
    pub async fn restore(&self) -> StateMachineResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Released) {
            return Err(self.released());
        }
        self.stop_locked(&mut lifecycle).await?;
        self.restore_locked(&mut lifecycle).await
    }

    /// Stop the processor task and wait for its acknowledgement
    pub async fn stop(&self) -> StateMachineResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop_locked(&mut lifecycle).await
    }

    /// Send an event and wait until it has been evaluated and every resulting step
    /// appended to the status store
    pub async fn send(&self, event: impl Into<EventId>) -> StateMachineResult<EventOutcome> {
        let event = event.into();
        let commands = match &*self.lifecycle.lock().await {
            Lifecycle::Running { commands, .. } => commands.clone(),
            _ => return Err(self.not_running()),
        };

        let (resp, response) = oneshot::channel();
        commands
            .send(MachineCommand::SendEvent { event, resp })
            .await
            .map_err(|_| self.not_running())?;

        response.await.map_err(|_| self.not_running())?
    }

    async fn restore_locked(&self, lifecycle: &mut Lifecycle) -> StateMachineResult<()> {
        let restored = self
            .persister
            .restore(&self.machine_id, &self.definition)
            .await?;
        *self.states.write() = restored;
        *lifecycle = Lifecycle::Stopped;

        log_machine_operation(
            "restore",
            &self.machine_id,
            self.definition.name(),
            "restored",
            Some(&self.states.read().to_string()),
        );
        Ok(())
    }

    async fn start_locked(&self, lifecycle: &mut Lifecycle) -> StateMachineResult<()> {
        let (processor, commands) = MachineProcessor::new(
            self.machine_id.clone(),
            self.definition.clone(),
            self.persister.clone(),
            self.states.clone(),
            self.config.command_buffer_size,
        );
        let (started_tx, started_rx) = oneshot::channel();
        let handle = tokio::spawn(processor.run(started_tx));

        match timeout(self.config.lifecycle_timeout(), started_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                handle.abort();
                return Err(internal_error(format!(
                    "processor for machine {} exited before starting",
                    self.machine_id
                )));
            }
            Err(_) => {
                handle.abort();
                return Err(self.timed_out("start"));
            }
        }

        *lifecycle = Lifecycle::Running { commands, handle };
        self.running.store(true, Ordering::Release);

        log_machine_operation(
            "start",
            &self.machine_id,
            self.definition.name(),
            "running",
            None,
        );
        Ok(())
    }

    async fn stop_locked(&self, lifecycle: &mut Lifecycle) -> StateMachineResult<()> {
        let (commands, handle) = match std::mem::replace(lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { commands, handle } => (commands, handle),
            other => {
                *lifecycle = other;
                return Ok(());
            }
        };
        self.running.store(false, Ordering::Release);

        let abort = handle.abort_handle();
        let (resp, stopped) = oneshot::channel();
        let shutdown = async move {
            // a closed channel means the processor is already gone
            if commands.send(MachineCommand::Stop { resp }).await.is_ok() {
                let _ = stopped.await;
            }
            drop(commands);
            handle.await
        };

        match timeout(self.config.lifecycle_timeout(), shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => {
                warn!(
                    machine_id = %self.machine_id,
                    error = %join_error,
                    "Machine processor ended abnormally"
                );
            }
            Err(_) => {
                abort.abort();
                return Err(self.timed_out("stop"));
            }
        }

        log_machine_operation(
            "stop",
            &self.machine_id,
            self.definition.name(),
            "stopped",
            None,
        );
        Ok(())
    }

    fn not_running(&self) -> StateMachineError {
        StateMachineError::MachineNotRunning {
            machine_id: self.machine_id.clone(),
        }
    }

    fn released(&self) -> StateMachineError {
        StateMachineError::MachineReleased {
            machine_id: self.machine_id.clone(),
        }
    }

    fn timed_out(&self, operation: &'static str) -> StateMachineError {
        StateMachineError::LifecycleTimeout {
            machine_id: self.machine_id.clone(),
            operation,
            timeout_ms: self.config.lifecycle_timeout_ms,
        }
    }
}

/// Command loop evaluating events for one machine
struct MachineProcessor {
    machine_id: String,
    definition: Arc<WorkflowDefinition>,
    persister: StatusPersister,
    states: Arc<RwLock<ActiveStateSet>>,
    command_receiver: Option<mpsc::Receiver<MachineCommand>>,
}

impl MachineProcessor {
    fn new(
        machine_id: String,
        definition: Arc<WorkflowDefinition>,
        persister: StatusPersister,
        states: Arc<RwLock<ActiveStateSet>>,
        command_buffer_size: usize,
    ) -> (Self, mpsc::Sender<MachineCommand>) {
        let (command_sender, command_receiver) = mpsc::channel(command_buffer_size);
        let processor = Self {
            machine_id,
            definition,
            persister,
            states,
            command_receiver: Some(command_receiver),
        };
        (processor, command_sender)
    }

    async fn run(mut self, started: oneshot::Sender<()>) {
        let Some(mut command_receiver) = self.command_receiver.take() else {
            warn!(machine_id = %self.machine_id, "Command receiver already taken");
            return;
        };

        if started.send(()).is_err() {
            debug!(machine_id = %self.machine_id, "Start was abandoned before acknowledgement");
            return;
        }

        while let Some(command) = command_receiver.recv().await {
            if !self.handle_command(command).await {
                break;
            }
        }

        debug!(machine_id = %self.machine_id, "Machine processor loop finished");
    }

    async fn handle_command(&mut self, command: MachineCommand) -> bool {
        match command {
            MachineCommand::SendEvent { event, resp } => {
                let result = self.handle_send_event(event).await;
                let _ = resp.send(result);
                true
            }
            MachineCommand::Stop { resp } => {
                let _ = resp.send(Ok(()));
                false
            }
        }
    }

    async fn handle_send_event(&self, event: EventId) -> StateMachineResult<EventOutcome> {
        let current = self.states.read().clone();
        let outcome = self.definition.transition(&current, &event);

        if !outcome.accepted {
            debug!(
                machine_id = %self.machine_id,
                event = %event,
                states = %current,
                "Event not accepted"
            );
            return Ok(EventOutcome {
                accepted: false,
                states: self.definition.ordered_states(&current),
            });
        }

        for step in &outcome.steps {
            if let Err(err) = self
                .persister
                .on_transition(&self.machine_id, &self.definition, step)
                .await
            {
                warn!(
                    machine_id = %self.machine_id,
                    event = %event,
                    state = %step.state,
                    error = %err,
                    "Failed to persist step, state left at last persisted step"
                );
                return Err(err);
            }
            *self.states.write() = step.after.clone();
        }

        info!(
            machine_id = %self.machine_id,
            event = %event,
            states = %outcome.states,
            steps = outcome.steps.len(),
            "Event accepted"
        );
        Ok(EventOutcome {
            accepted: true,
            states: self.definition.ordered_states(&outcome.states),
        })
    }
}
