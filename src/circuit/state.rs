//! Module which contains data about circuit state.
//!
//! This notably includes types which hold the state within a circuit, such as:
//! - [`CircuitState`]: The state in a circuit
//! - [`FunctionState`]: The state of a gate
//! - [`InnerFunctionState`]: Internal state of stateful gates

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use slotmap::secondary::Entry;
use tracing::{trace, warn};

use crate::circuit::graph::{CircuitGraph, GateKey, PinRef};
use crate::error::{EvalIssue, OscillationDetected};
use crate::func::{ClockState, Component, ComponentFn, FlopState, PortUpdate, RunContext};

/// The state of the circuit.
///
/// This includes all port values, internal gate state,
/// and any work which has not been propagated yet.
#[derive(Default, Debug, Clone)]
pub struct CircuitState {
    pub(crate) functions: SecondaryMap<GateKey, FunctionState>,
    pub(crate) transient: TransientState
}
impl CircuitState {
    /// Creates a new empty CircuitState.
    pub fn new() -> Self {
        Default::default()
    }

    /// Initializes a gate's state in this CircuitState
    /// and marks it for evaluation.
    pub(crate) fn init_func(&mut self, key: GateKey, func: &ComponentFn) {
        if let Some(Entry::Vacant(e)) = self.functions.entry(key) {
            e.insert(FunctionState::new(func));
        }
        self.transient.frontier.insert(key);
    }
    /// Removes a gate's state, along with any pending work for it.
    pub(crate) fn remove_func(&mut self, key: GateKey) {
        self.functions.remove(key);
        self.transient.triggers.retain(|pin, _| pin.gate != key);
        self.transient.frontier.remove(&key);
    }
    /// Marks a gate as needing evaluation.
    pub(crate) fn mark_dirty(&mut self, key: GateKey) {
        self.transient.frontier.insert(key);
    }

    /// Replaces the bit held by a gate's inner state
    /// (an input's value or a latch's stored bit).
    ///
    /// Returns whether the gate holds a bit.
    /// The change is propagated on the next convergence.
    pub(crate) fn set_bit(&mut self, key: GateKey, value: bool) -> bool {
        match self.functions.get_mut(key).and_then(|s| s.inner.as_mut()) {
            Some(InnerFunctionState::Bit(bit)) => {
                *bit = value;
                self.transient.frontier.insert(key);
                true
            },
            _ => false
        }
    }

    /// Advances the schedule of every clock by one tick,
    /// marking the clocks which toggled for evaluation.
    ///
    /// Returns the number of clocks which toggled.
    pub(crate) fn tick_clocks(&mut self, graph: &CircuitGraph) -> usize {
        let mut toggled = 0;
        for (key, node) in graph.gates() {
            let ComponentFn::Clock(clock) = node.func() else { continue };
            let Some(InnerFunctionState::Clock(schedule)) = self.functions.get_mut(key).and_then(|s| s.inner.as_mut()) else { continue };

            if clock.tick(schedule) {
                self.transient.frontier.insert(key);
                toggled += 1;
            }
        }
        toggled
    }

    /// Gets the value of a pin, if it exists.
    pub fn value(&self, pin: PinRef) -> Option<bool> {
        self.functions.get(pin.gate)?
            .ports.get(pin.index)
            .copied()
    }

    /// Gets the state of a gate, if it exists.
    pub fn get(&self, key: GateKey) -> Option<&FunctionState> {
        self.functions.get(key)
    }

    /// Whether there is no pending work.
    pub fn is_settled(&self) -> bool {
        self.transient.resolved()
    }

    /// Pushes transient state, propagating any updates through
    /// until the circuit stabilizes or `limit` delta cycles have passed.
    ///
    /// Each delta cycle first commits every pending output update
    /// (marking the gates they feed as dirty),
    /// then evaluates every dirty gate against the committed values,
    /// buffering changed outputs for the next delta cycle.
    /// Dirty gates are evaluated in ascending key order,
    /// though the result does not depend on that order.
    ///
    /// Once no work is left, every gate evaluated since the last fixed point
    /// is given its settled ports (see [`Component::settle`]).
    /// Edge-triggered gates latch there, at most once per call,
    /// and convergence continues from whatever they changed.
    ///
    /// This takes the graph to determine the relationship between gates.
    /// If the circuit has not stabilized within `limit` delta cycles,
    /// this raises [`OscillationDetected`] and leaves the state mid-propagation;
    /// the caller is responsible for restoring it.
    pub fn propagate(&mut self, graph: &CircuitGraph, limit: usize, tick: u64) -> Result<PropagateStats, OscillationDetected> {
        let mut stats = PropagateStats::default();
        let mut diagnostics = BTreeSet::new();
        let mut evaluated = BTreeSet::new();
        let mut latched = BTreeSet::new();

        loop {
            while let Some(pending) = self.transient.first_pending() {
                if stats.passes >= limit {
                    warn!(gate = ?pending, passes = stats.passes, tick, "circuit did not stabilize");
                    return Err(OscillationDetected { gate: pending, passes: stats.passes, tick });
                }
                trace!(
                    pass = stats.passes,
                    triggers = self.transient.triggers.len(),
                    frontier = self.transient.frontier.len(),
                    "delta cycle"
                );

                // 1. Commit pending outputs, save gates to waken in frontier
                for (pin, value) in std::mem::take(&mut self.transient.triggers) {
                    let Some(state) = self.functions.get_mut(pin.gate) else { continue };
                    state.ports[pin.index] = value;
                    self.transient.frontier.extend(graph.fanout_of(pin).map(|p| p.gate));
                }

                // 2. For all gates to waken, apply function and save triggers for next cycle
                for key in std::mem::take(&mut self.transient.frontier) {
                    let Some(gate) = graph.gate(key) else { continue };
                    let inputs: Vec<_> = gate.input_indices()
                        .map(|index| (index, self.driver_value(graph, PinRef::new(key, index))))
                        .collect();
                    let Some(state) = self.functions.get_mut(key) else { continue };

                    // Update inputs:
                    let old_ports = state.ports.clone();
                    for (index, value) in inputs {
                        state.ports[index] = value;
                    }

                    stats.evaluations += 1;
                    evaluated.insert(key);
                    let result = gate.func().run(RunContext {
                        old_ports: &old_ports,
                        new_ports: &state.ports,
                        inner_state: state.inner.as_mut()
                    });
                    match result {
                        Ok(updates) => for PortUpdate { index, value } in updates {
                            // Push outputs:
                            debug_assert!(gate.ports()[index].accepts_output(), "Input port cannot be updated");
                            if state.ports[index] != value {
                                self.transient.triggers.insert(PinRef::new(key, index), value);
                            }
                        },
                        Err(issue) => {
                            let diagnostic = Diagnostic { tick, gate: key, issue };
                            if diagnostics.insert(diagnostic) {
                                warn!(?key, %issue, tick, "gate could not be evaluated, holding outputs");
                            }
                        }
                    }
                }

                stats.passes += 1;
            }

            // 3. Fixed point: let gates observe their settled ports
            for key in std::mem::take(&mut evaluated) {
                let (Some(gate), Some(state)) = (graph.gate(key), self.functions.get_mut(key)) else { continue };
                let may_latch = !latched.contains(&key);
                if gate.func().settle(&state.ports, state.inner.as_mut(), may_latch) {
                    latched.insert(key);
                    self.transient.frontier.insert(key);
                }
            }
            if self.transient.resolved() {
                break;
            }
            trace!(latched = latched.len(), tick, "edge-triggered gates latched");
        }

        stats.diagnostics = diagnostics.into_iter().collect();
        Ok(stats)
    }

    /// The value an input pin reads from its driver.
    ///
    /// Undriven pins read low.
    fn driver_value(&self, graph: &CircuitGraph, pin: PinRef) -> bool {
        graph.driver_of(pin)
            .and_then(|driver| self.value(driver))
            .unwrap_or(false)
    }
}

impl Index<GateKey> for CircuitState {
    type Output = FunctionState;

    fn index(&self, index: GateKey) -> &Self::Output {
        &self.functions[index]
    }
}

/// The state of a [`GateNode`].
///
/// [`GateNode`]: crate::circuit::graph::GateNode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionState {
    pub(crate) ports: Vec<bool>,
    pub(crate) inner: Option<InnerFunctionState>
}
impl FunctionState {
    /// Creates a new initial function state for the specified `func`.
    pub fn new(func: &ComponentFn) -> Self {
        let mut ports = vec![false; func.ports().len()];
        func.initialize_port_state(&mut ports);
        let inner = func.initialize_inner_state();

        Self { ports, inner }
    }

    /// Gets the value of every port.
    pub fn ports(&self) -> &[bool] {
        &self.ports
    }
    /// Gets the value of a port.
    pub fn get_port(&self, index: usize) -> Option<bool> {
        self.ports.get(index).copied()
    }
    /// Gets the gate's internal state.
    pub fn inner(&self) -> Option<&InnerFunctionState> {
        self.inner.as_ref()
    }
}

/// Internal state of gates which remember something between evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InnerFunctionState {
    /// A clock's schedule position.
    Clock(ClockState),
    /// A single stored bit (an input's value or a latch's stored bit).
    Bit(bool),
    /// A flip-flop's stored bit and the clock it saw at the last fixed point.
    Flop(FlopState)
}

/// An evaluation issue which was recovered from during convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The tick at which the issue occurred.
    pub tick: u64,
    /// The gate which could not be evaluated.
    pub gate: GateKey,
    /// What went wrong.
    pub issue: EvalIssue
}

/// Statistics from a single convergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagateStats {
    /// Delta cycles run.
    pub passes: usize,
    /// Gate evaluations performed.
    pub evaluations: usize,
    /// Issues recovered from, deduplicated and ordered by gate.
    pub diagnostics: Vec<Diagnostic>
}

#[derive(Default, Debug, Clone)]
pub(crate) struct TransientState {
    /// Output updates to commit at the start of the next delta cycle.
    pub(crate) triggers: BTreeMap<PinRef, bool>,
    /// Gates to evaluate in the next delta cycle.
    pub(crate) frontier: BTreeSet<GateKey>
}
impl TransientState {
    pub fn resolved(&self) -> bool {
        self.triggers.is_empty() && self.frontier.is_empty()
    }

    /// The smallest gate with pending work.
    fn first_pending(&self) -> Option<GateKey> {
        let triggered = self.triggers.keys().next().map(|pin| pin.gate);
        let dirty = self.frontier.first().copied();
        triggered.into_iter().chain(dirty).min()
    }
}
