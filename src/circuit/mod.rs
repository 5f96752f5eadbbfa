//! Circuit module used to create and simulate circuits.
//!
//! A [`Circuit`] owns its structure ([`CircuitGraph`]) and its state ([`CircuitState`]).
//! Editing operations only record what needs to be recomputed;
//! [`Circuit::set_input`], [`Circuit::advance`] and [`Circuit::propagate`]
//! converge the circuit to a fixed point.

pub mod graph;
pub mod snapshot;
pub mod state;
pub mod validate;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::circuit::graph::{CircuitGraph, GateKey, PinRef, WireKey};
use crate::circuit::state::{CircuitState, Diagnostic, PropagateStats};
use crate::circuit::validate::ValidationReport;
use crate::config::SimConfig;
use crate::error::{ConnectionError, InvalidOperation, OscillationDetected, SetInputError};
use crate::func::{ComponentFn, Input, Output};

/// The values of every output gate after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickRecord {
    /// The tick which was completed.
    pub tick: u64,
    /// The value observed by each output gate.
    pub outputs: BTreeMap<GateKey, bool>
}

/// A summary of the work done by a simulation operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// The tick counter once the operation completed.
    pub tick: u64,
    /// Delta cycles run, summed over every convergence.
    pub passes: usize,
    /// Gate evaluations performed, summed over every convergence.
    pub evaluations: usize,
    /// Issues recovered from while evaluating gates.
    pub diagnostics: Vec<Diagnostic>,
    /// One record per completed tick (empty unless time advanced).
    pub ticks: Vec<TickRecord>
}
impl ConvergenceReport {
    fn absorb(&mut self, stats: PropagateStats) {
        self.passes += stats.passes;
        self.evaluations += stats.evaluations;
        self.diagnostics.extend(stats.diagnostics);
    }
}

/// A circuit, which includes its structure ([`CircuitGraph`]) and its state ([`CircuitState`]).
#[derive(Debug, Default)]
pub struct Circuit {
    graph: CircuitGraph,
    state: CircuitState,
    config: SimConfig,
    tick: u64
}

impl Circuit {
    /// Creates an empty circuit with the default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates an empty circuit with the specified configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// The circuit's configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
    /// Replaces the circuit's configuration.
    pub fn set_config(&mut self, config: SimConfig) {
        self.config = config;
    }

    /// Create a gate with the passed component function.
    ///
    /// The gate is evaluated on the next convergence.
    pub fn add_gate<F: Into<ComponentFn>>(&mut self, f: F) -> GateKey {
        let key = self.graph.add_gate(f.into());
        self.state.init_func(key, self.graph[key].func());
        key
    }

    /// Adds an input gate which starts with the passed value.
    pub fn add_input(&mut self, initial: bool) -> GateKey {
        self.add_gate(Input::new(initial))
    }

    /// Adds an output gate.
    pub fn add_output(&mut self) -> GateKey {
        self.add_gate(Output::new())
    }

    /// Removes a gate and all of its wires.
    ///
    /// Gates it was driving now have undriven inputs (which read low).
    /// Returns whether the gate existed.
    pub fn remove_gate(&mut self, key: GateKey) -> bool {
        let Some(wires) = self.graph.remove_gate(key) else {
            return false;
        };

        self.state.remove_func(key);
        for wire in wires {
            if wire.to.gate != key {
                self.state.mark_dirty(wire.to.gate);
            }
        }
        true
    }

    /// Connect an output pin to an input pin.
    ///
    /// The sink gate is re-evaluated on the next convergence.
    pub fn connect(&mut self, from: PinRef, to: PinRef) -> Result<WireKey, ConnectionError> {
        let key = self.graph.add_wire(from, to)?;
        self.state.mark_dirty(to.gate);
        Ok(key)
    }

    /// Connects each of the passed output pins to the gate's input ports, in port order.
    ///
    /// If any connection fails, the connections made before it are kept.
    pub fn connect_all(&mut self, gate: GateKey, drivers: &[PinRef]) -> Result<Vec<WireKey>, ConnectionError> {
        drivers.iter()
            .enumerate()
            .map(|(index, &from)| self.connect(from, PinRef::new(gate, index)))
            .collect()
    }

    /// Removes a wire.
    ///
    /// The former sink reads low from the next convergence on.
    /// Returns whether the wire existed.
    pub fn disconnect(&mut self, key: WireKey) -> bool {
        match self.graph.remove_wire(key) {
            Some(wire) => {
                self.state.mark_dirty(wire.to.gate);
                true
            },
            None => false
        }
    }

    /// Sets the value of an input gate and converges the circuit, without advancing time.
    ///
    /// If the circuit oscillates, the input keeps its previous value
    /// and the circuit is left as it was before this call.
    pub fn set_input(&mut self, gate: GateKey, value: bool) -> Result<ConvergenceReport, SetInputError> {
        let node = self.graph.gate(gate).ok_or(InvalidOperation::MissingGate(gate))?;
        if !matches!(node.func(), ComponentFn::Input(_)) {
            return Err(InvalidOperation::NotAnInput(gate).into());
        }

        let stats = self.checkpointed(|circuit| {
            circuit.state.set_bit(gate, value);
        })?;

        let mut report = ConvergenceReport { tick: self.tick, ..Default::default() };
        report.absorb(stats);
        Ok(report)
    }

    /// Settles any pending edits, then advances time by `ticks` ticks.
    ///
    /// Each tick advances every clock, converges the circuit
    /// and records the value of every output.
    ///
    /// If the circuit oscillates, the failing tick is undone
    /// (ticks before it are kept) and the error is returned.
    pub fn advance(&mut self, ticks: u32) -> Result<ConvergenceReport, OscillationDetected> {
        let mut report = self.propagate()?;

        for _ in 0..ticks {
            let stats = self.checkpointed(|circuit| {
                circuit.tick += 1;
                circuit.state.tick_clocks(&circuit.graph);
            })?;
            debug!(tick = self.tick, passes = stats.passes, evaluations = stats.evaluations, "tick complete");

            report.absorb(stats);
            report.ticks.push(TickRecord { tick: self.tick, outputs: self.outputs() });
        }

        report.tick = self.tick;
        Ok(report)
    }

    /// Pushes transient state, propagating any updates through
    /// (until the circuit stabilizes or an oscillation occurs).
    ///
    /// This does not advance time.
    pub fn propagate(&mut self) -> Result<ConvergenceReport, OscillationDetected> {
        let stats = self.checkpointed(|_| {})?;

        let mut report = ConvergenceReport { tick: self.tick, ..Default::default() };
        report.absorb(stats);
        Ok(report)
    }

    /// Applies an edit and converges the circuit.
    ///
    /// If convergence fails, the edit is undone along with any partial propagation.
    fn checkpointed(&mut self, edit: impl FnOnce(&mut Self)) -> Result<PropagateStats, OscillationDetected> {
        let saved_state = self.state.clone();
        let saved_tick = self.tick;

        edit(self);
        let limit = self.config.pass_limit(self.graph.gate_count());
        match self.state.propagate(&self.graph, limit, self.tick) {
            Ok(stats) => {
                debug!(tick = self.tick, passes = stats.passes, evaluations = stats.evaluations, "converged");
                Ok(stats)
            },
            Err(e) => {
                warn!(tick = self.tick, "rolling back to last stable state");
                self.state = saved_state;
                self.tick = saved_tick;
                Err(e)
            }
        }
    }

    /// Gets the value of a pin.
    ///
    /// Input pins hold the value they read at their gate's last evaluation.
    pub fn pin_value(&self, gate: GateKey, index: usize) -> Option<bool> {
        self.state.value(PinRef::new(gate, index))
    }

    /// Gets the value observed by every output gate.
    pub fn outputs(&self) -> BTreeMap<GateKey, bool> {
        self.graph.gates()
            .filter(|(_, node)| matches!(node.func(), ComponentFn::Output(_)))
            .filter_map(|(key, _)| Some((key, self.pin_value(key, 0)?)))
            .collect()
    }

    /// Checks the circuit for structural problems.
    pub fn validate(&self) -> ValidationReport {
        validate::validate_graph(&self.graph)
    }

    /// The number of ticks simulated so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }
    /// Gets current circuit graph.
    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }
    /// Gets current circuit state.
    pub fn state(&self) -> &CircuitState {
        &self.state
    }
}
