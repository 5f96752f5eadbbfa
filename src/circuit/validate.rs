//! Structural checks run before simulating a circuit.
//!
//! Validation never blocks simulation.
//! Callers decide whether to simulate based on the [`ValidationReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::hash::Hash;

use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::circuit::graph::{CircuitGraph, GateKey, PinRef};
use crate::error::ValidationError;
use crate::func::{Component, ComponentFn};

/// Findings of a structural check.
///
/// `K` identifies gates: [`GateKey`] for live circuits, snapshot indices for snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport<K: Debug = GateKey> {
    /// Input pins without a driver (a warning: they read low).
    pub dangling: Vec<PinRef<K>>,
    /// Input pins with more than one driver.
    pub multi_driver: Vec<PinRef<K>>,
    /// Feedback loops which pass through no stateful gate,
    /// each listed as its gates in ascending order.
    pub combinational_cycles: Vec<Vec<K>>
}
impl<K: Debug> ValidationReport<K> {
    /// Whether nothing fatal was found (dangling pins are allowed).
    pub fn is_ok(&self) -> bool {
        self.multi_driver.is_empty() && self.combinational_cycles.is_empty()
    }

    /// Converts the fatal findings into an error.
    ///
    /// Multiple drivers are reported before combinational cycles.
    pub fn into_result(self) -> Result<Self, ValidationError<K>> {
        if !self.multi_driver.is_empty() {
            Err(ValidationError::MultiDriver(self.multi_driver))
        } else if !self.combinational_cycles.is_empty() {
            Err(ValidationError::CombinationalCycle(self.combinational_cycles))
        } else {
            Ok(self)
        }
    }
}

/// Validates a live circuit graph.
pub(crate) fn validate_graph(graph: &CircuitGraph) -> ValidationReport {
    validate_netlist(
        graph.gates().map(|(key, node)| (key, node.func())),
        graph.wires().map(|(_, wire)| (wire.from, wire.to))
    )
}

/// Validates any list of gates and wires.
///
/// Wires touching gates or ports outside the list are ignored.
pub(crate) fn validate_netlist<'a, K>(
    gates: impl IntoIterator<Item = (K, &'a ComponentFn)>,
    wires: impl IntoIterator<Item = (PinRef<K>, PinRef<K>)>
) -> ValidationReport<K>
    where K: Copy + Ord + Hash + Debug
{
    let gates: BTreeMap<K, &ComponentFn> = gates.into_iter().collect();
    let is_input = |pin: PinRef<K>| {
        gates.get(&pin.gate)
            .and_then(|f| f.ports().get(pin.index).copied())
            .is_some_and(|ty| ty.accepts_input())
    };

    let mut drivers: BTreeMap<PinRef<K>, usize> = BTreeMap::new();
    let mut comb_graph = DiGraphMap::<K, ()>::new();
    for (&key, func) in &gates {
        if !func.is_stateful() {
            comb_graph.add_node(key);
        }
    }

    for (from, to) in wires {
        if !is_input(to) || !gates.contains_key(&from.gate) {
            continue;
        }
        *drivers.entry(to).or_default() += 1;
        if comb_graph.contains_node(from.gate) && comb_graph.contains_node(to.gate) {
            comb_graph.add_edge(from.gate, to.gate, ());
        }
    }

    let dangling = gates.iter()
        .flat_map(|(&key, func)| {
            func.ports().into_iter()
                .enumerate()
                .filter(|(_, ty)| ty.accepts_input())
                .map(move |(index, _)| PinRef::new(key, index))
        })
        .filter(|pin| !drivers.contains_key(pin))
        .collect();
    let multi_driver = drivers.iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(&pin, _)| pin)
        .collect();

    let mut combinational_cycles: Vec<_> = kosaraju_scc(&comb_graph).into_iter()
        .filter(|scc| scc.len() > 1 || comb_graph.contains_edge(scc[0], scc[0]))
        .map(|scc| scc.into_iter().collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>())
        .collect();
    combinational_cycles.sort();

    let report = ValidationReport { dangling, multi_driver, combinational_cycles };
    debug!(
        dangling = report.dangling.len(),
        multi_driver = report.multi_driver.len(),
        cycles = report.combinational_cycles.len(),
        "validated circuit"
    );
    report
}
