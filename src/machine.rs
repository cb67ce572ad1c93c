//! This module defines the `TuringMachine` stepper, which drives a head over a tape by pulling
//! one transition per step from a controller until a terminal state is entered or the
//! controller has no transition for the current input.

use std::fmt;

use crate::controller::Controller;
use crate::log::{IOPair, MachineLog};
use crate::tape::{Head, TapeHead};
use crate::types::{Input, State, Status, Word};

/// Why a machine stopped unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A terminal state with failure status was entered.
    Terminal(State),
    /// The controller had no transition for `symbol` read in `state`.
    Undefined { state: State, symbol: Word },
    /// The controller is empty.
    NoInitialState,
}

/// The final outcome of an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Success,
    Failure(Failure),
}

impl Halt {
    pub fn is_success(&self) -> bool {
        matches!(self, Halt::Success)
    }
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Success => write!(f, "success"),
            Halt::Failure(Failure::Terminal(state)) => {
                write!(f, "failure: entered {state}")
            }
            Halt::Failure(Failure::Undefined { state, symbol }) => {
                write!(f, "failure: no transition for '{symbol}' in {state}")
            }
            Halt::Failure(Failure::NoInitialState) => write!(f, "failure: no initial state"),
        }
    }
}

/// The result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halt(Halt),
}

/// A single-tape machine driven by a [`Controller`].
///
/// The first call to [`step`](TuringMachine::step) (or an explicit
/// [`start`](TuringMachine::start)) asks the controller for the initial state; this does not
/// consume a timestep. Every executed step reads the word under the head, asks the controller
/// for a transition, applies its action and advances the timestep.
pub struct TuringMachine<C: Controller, H: TapeHead = Head> {
    controller: C,
    head: H,
    state: Option<State>,
    timestep: usize,
    started: bool,
    halt: Option<Halt>,
    halted_at: Option<usize>,
    log: MachineLog,
}

impl<C: Controller, H: TapeHead> TuringMachine<C, H> {
    pub fn new(controller: C, head: H) -> Self {
        Self {
            controller,
            head,
            state: None,
            timestep: 0,
            started: false,
            halt: None,
            halted_at: None,
            log: MachineLog::new(),
        }
    }

    /// Queries the controller for the initial state.
    ///
    /// Halts with [`Failure::NoInitialState`] when the controller has none, and halts
    /// immediately when the initial state is terminal. Calling `start` again has no effect.
    pub fn start(&mut self) -> Step {
        if self.started {
            return self.current();
        }
        self.started = true;

        let input = Input::new(self.head.read(), self.timestep);
        match self.controller.next(None, &input).state {
            Some(state) => {
                tracing::debug!("starting in {}", state);
                let terminal = state.terminal;
                self.state = Some(state);
                if terminal {
                    self.finish_terminal();
                }
            }
            None => self.finish(Halt::Failure(Failure::NoInitialState)),
        }

        self.current()
    }

    /// Executes one step.
    ///
    /// Every executed step advances the timestep. An undefined transition halts with failure
    /// at the current timestep without touching the tape or the log. Once halted, every call
    /// returns the same outcome.
    pub fn step(&mut self) -> Step {
        if let Step::Halt(halt) = self.start() {
            return Step::Halt(halt);
        }

        let Some(state) = self.state.clone() else {
            return self.current();
        };

        let symbol = self.head.read();
        let input = Input::new(symbol, self.timestep);
        let output = self.controller.next(Some(&state), &input);

        let Some(next) = output.state.clone() else {
            tracing::debug!("t={} no transition for '{}' in {}", self.timestep, symbol, state);
            self.finish(Halt::Failure(Failure::Undefined { state, symbol }));
            self.timestep += 1;
            return self.current();
        };

        if let Some(action) = output.action {
            action.exec(&mut self.head);
        }
        tracing::debug!(
            "t={} {} '{}' -> {} {}",
            self.timestep,
            state,
            symbol,
            output.action.map(|a| a.to_string()).unwrap_or_default(),
            next
        );

        if let Err(e) = self.log.log(IOPair::new(input, output)) {
            tracing::warn!("unable to log step {}: {}", self.timestep, e);
        }

        let terminal = next.terminal;
        self.state = Some(next);
        if terminal {
            self.finish_terminal();
            self.timestep += 1;
            return self.current();
        }

        self.timestep += 1;
        Step::Continue
    }

    /// Steps until the machine halts. Does not return for a controller that loops forever.
    pub fn run(&mut self) -> Halt {
        loop {
            if let Step::Halt(halt) = self.step() {
                return halt;
            }
        }
    }

    /// Executes at most `limit` steps. Returns [`Step::Continue`] if the machine is still
    /// running when the budget is exhausted.
    pub fn run_for(&mut self, limit: usize) -> Step {
        if let Step::Halt(halt) = self.start() {
            return Step::Halt(halt);
        }

        for _ in 0..limit {
            if let Step::Halt(halt) = self.step() {
                return Step::Halt(halt);
            }
        }

        tracing::debug!("step budget of {} exhausted", limit);
        Step::Continue
    }

    /// The current state, or `None` before the machine starts.
    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    /// The timestep of the next step to execute.
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// The outcome, once halted.
    pub fn outcome(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    /// The timestep at which the machine halted.
    pub fn halted_at(&self) -> Option<usize> {
        self.halted_at
    }

    /// The trace of executed steps.
    pub fn log(&self) -> &MachineLog {
        &self.log
    }

    pub fn head(&self) -> &H {
        &self.head
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Consumes the machine, returning its head and trace.
    pub fn into_parts(self) -> (H, MachineLog) {
        (self.head, self.log)
    }

    fn current(&self) -> Step {
        match &self.halt {
            Some(halt) => Step::Halt(halt.clone()),
            None => Step::Continue,
        }
    }

    fn finish_terminal(&mut self) {
        let Some(state) = self.state.clone() else {
            return;
        };

        match state.status {
            Status::Success => self.finish(Halt::Success),
            Status::Failure => self.finish(Halt::Failure(Failure::Terminal(state))),
        }
    }

    fn finish(&mut self, halt: Halt) {
        tracing::info!("halted at t={}: {}", self.timestep, halt);
        self.halted_at = Some(self.timestep);
        self.halt = Some(halt);
    }
}
