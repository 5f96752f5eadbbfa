//! Serializable snapshots of a circuit's structure and state.
//!
//! A [`CircuitSnapshot`] identifies gates by their index in [`CircuitSnapshot::gates`],
//! so it does not depend on the keys of the circuit it was taken from.

use std::mem::discriminant;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::circuit::Circuit;
use crate::circuit::graph::{GateKey, PinRef};
use crate::circuit::state::{FunctionState, InnerFunctionState};
use crate::circuit::validate::{ValidationReport, validate_netlist};
use crate::config::SimConfig;
use crate::error::{SnapshotError, ValidationError};
use crate::func::ComponentFn;

/// A gate and its state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    /// The gate's kind.
    pub func: ComponentFn,
    /// The value of each port.
    pub ports: Vec<bool>,
    /// Internal state (clock schedule, stored bit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<InnerFunctionState>
}

/// A wire between two gates, by index.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSnapshot {
    /// The driving output pin.
    pub from: PinRef<usize>,
    /// The driven input pin.
    pub to: PinRef<usize>
}

/// The structure and state of a circuit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// The tick counter.
    pub tick: u64,
    /// All gates.
    pub gates: Vec<GateSnapshot>,
    /// All wires.
    pub wires: Vec<WireSnapshot>,
    /// The circuit's configuration (the default if missing).
    #[serde(default)]
    pub config: SimConfig
}
impl CircuitSnapshot {
    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a snapshot from JSON.
    ///
    /// This only checks that the snapshot is well-formed.
    /// Structural problems are found by [`CircuitSnapshot::validate`]
    /// or when loading it with [`Circuit::from_snapshot`].
    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Checks the snapshot for structural problems.
    ///
    /// Unlike a live circuit, a snapshot can have input pins with several drivers.
    pub fn validate(&self) -> ValidationReport<usize> {
        validate_netlist(
            self.gates.iter().map(|g| &g.func).enumerate(),
            self.wires.iter().map(|w| (w.from, w.to))
        )
    }
}

impl Circuit {
    /// Captures the circuit's structure, state and configuration.
    ///
    /// Pending work which has not been propagated is not captured,
    /// though every gate is re-evaluated when the snapshot is loaded.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let index: SecondaryMap<GateKey, usize> = self.graph.gates()
            .enumerate()
            .map(|(i, (key, _))| (key, i))
            .collect();

        let gates = self.graph.gates()
            .map(|(key, node)| {
                let FunctionState { ports, inner } = self.state.get(key)
                    .cloned()
                    .unwrap_or_else(|| FunctionState::new(node.func()));
                GateSnapshot { func: node.func().clone(), ports, inner }
            })
            .collect();
        let wires = self.graph.wires()
            .map(|(_, wire)| WireSnapshot {
                from: PinRef::new(index[wire.from.gate], wire.from.index),
                to: PinRef::new(index[wire.to.gate], wire.to.index)
            })
            .collect();

        CircuitSnapshot { tick: self.tick, gates, wires, config: self.config }
    }

    /// Rebuilds a circuit from a snapshot.
    ///
    /// This also returns the key of each gate, in snapshot order.
    /// Every gate is marked for evaluation, so the next convergence
    /// settles anything the snapshot left unsettled.
    ///
    /// Combinational cycles are loaded as-is (see [`Circuit::validate`]),
    /// but inputs with several drivers cannot be represented and are rejected.
    pub fn from_snapshot(snapshot: &CircuitSnapshot) -> Result<(Circuit, Vec<GateKey>), SnapshotError> {
        let report = snapshot.validate();
        if !report.multi_driver.is_empty() {
            return Err(ValidationError::MultiDriver(report.multi_driver).into());
        }

        let mut circuit = Circuit::with_config(snapshot.config);
        circuit.tick = snapshot.tick;

        let mut keys = Vec::with_capacity(snapshot.gates.len());
        for (i, gate) in snapshot.gates.iter().enumerate() {
            let key = circuit.add_gate(gate.func.clone());
            let state = &mut circuit.state.functions[key];

            if gate.ports.len() != state.ports.len() {
                return Err(SnapshotError::PortCount { gate: i, expected: state.ports.len(), actual: gate.ports.len() });
            }
            let inner_matches = match (&state.inner, &gate.inner) {
                (None, None) => true,
                (Some(expected), Some(actual)) => discriminant(expected) == discriminant(actual),
                _ => false
            };
            if !inner_matches {
                return Err(SnapshotError::InnerState(i));
            }
            if let (ComponentFn::Clock(clock), Some(InnerFunctionState::Clock(schedule))) = (&gate.func, &gate.inner)
                && schedule.phase >= clock.period()
            {
                return Err(SnapshotError::InnerState(i));
            }

            state.ports.clone_from(&gate.ports);
            state.inner = gate.inner;
            keys.push(key);
        }

        let resolve = |pin: PinRef<usize>| {
            keys.get(pin.gate)
                .map(|&key| PinRef::new(key, pin.index))
                .ok_or(SnapshotError::MissingGate(pin.gate))
        };
        for wire in &snapshot.wires {
            let (from, to) = (resolve(wire.from)?, resolve(wire.to)?);
            circuit.connect(from, to)?;
        }

        Ok((circuit, keys))
    }
}
