//! Errors and diagnostics raised by the engine.
//!
//! Errors fall into four groups:
//! - structural ([`ConnectionError`], [`ValidationError`]), raised while editing or validating,
//! - evaluation-time ([`EvalIssue`]), recovered by holding a gate's outputs,
//! - divergence ([`OscillationDetected`]), which aborts one operation and keeps the last stable state,
//! - misuse of the API ([`InvalidOperation`], [`DefineGateError`], [`ParameterOutOfRange`], [`SnapshotError`]).

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::graph::{GateKey, PinRef};

/// Reasons a wire could not be connected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// One of the endpoints refers to a gate which does not exist.
    #[error("gate {0:?} does not exist")]
    MissingGate(GateKey),
    /// One of the endpoints refers to a port the gate does not have.
    #[error("no such port {0}")]
    NoSuchPort(PinRef),
    /// The source of the wire is not an output port.
    #[error("{0} is not an output port")]
    NotAnOutput(PinRef),
    /// The sink of the wire is not an input port.
    #[error("{0} is not an input port")]
    NotAnInput(PinRef),
    /// The sink already has a driver (inputs have a fan-in of 1).
    #[error("{pin} is already driven by {driver}")]
    AlreadyDriven {
        /// The input pin that was being connected.
        pin: PinRef,
        /// The output pin which already drives it.
        driver: PinRef
    }
}

/// Issues a gate can report while being evaluated.
///
/// The engine recovers from these by holding the gate's previous outputs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvalIssue {
    /// A custom gate was given an input pattern its truth table does not define.
    #[error("truth table has no entry for input pattern {pattern:#b}")]
    UndefinedTruthTableEntry {
        /// The undefined input pattern (bit `i` is input `i`).
        pattern: u64
    },
    /// An SR latch had both set and reset asserted.
    #[error("latch has both S and R asserted")]
    IllegalLatchState
}

/// Convergence exceeded its pass limit.
///
/// The operation that caused it is rolled back.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("circuit did not stabilize after {passes} passes at tick {tick} (gate {gate:?} still changing)")]
pub struct OscillationDetected {
    /// A gate which was still changing when convergence was aborted.
    pub gate: GateKey,
    /// The number of delta cycles run before aborting.
    pub passes: usize,
    /// The tick at which convergence was attempted.
    pub tick: u64
}

/// An operation was applied to a gate which does not support it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperation {
    /// The gate does not exist.
    #[error("gate {0:?} does not exist")]
    MissingGate(GateKey),
    /// The gate is not an input.
    #[error("gate {0:?} is not an input")]
    NotAnInput(GateKey)
}

/// Reasons [`Circuit::set_input`] can fail.
///
/// [`Circuit::set_input`]: crate::circuit::Circuit::set_input
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SetInputError {
    /// The gate could not be set.
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),
    /// The new value caused the circuit to oscillate. The input was restored.
    #[error(transparent)]
    Oscillation(#[from] OscillationDetected)
}

/// Reasons a custom gate definition is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DefineGateError {
    /// The number of pins is out of range.
    #[error("unsupported arity: {n_inputs} inputs, {n_outputs} outputs")]
    Arity {
        /// Declared inputs.
        n_inputs: u8,
        /// Declared outputs.
        n_outputs: u8
    },
    /// An input pattern uses more bits than there are inputs.
    #[error("input pattern {pattern:#b} does not fit in {n_inputs} inputs")]
    InputPatternOutOfRange {
        /// The offending pattern.
        pattern: u64,
        /// Declared inputs.
        n_inputs: u8
    },
    /// An output pattern uses more bits than there are outputs.
    #[error("output pattern {output:#b} (for input {pattern:#b}) does not fit in {n_outputs} outputs")]
    OutputPatternOutOfRange {
        /// The input pattern of the entry.
        pattern: u64,
        /// The offending output pattern.
        output: u64,
        /// Declared outputs.
        n_outputs: u8
    }
}

/// A serialized gate has a parameter outside the range its kind supports.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{name} = {value} is outside {min}..={max}")]
pub struct ParameterOutOfRange {
    /// The parameter's name.
    pub name: &'static str,
    /// The rejected value.
    pub value: u64,
    /// Smallest supported value.
    pub min: u64,
    /// Largest supported value.
    pub max: u64
}

/// Fatal structural problems found by validation.
///
/// `K` identifies gates: [`GateKey`] for live circuits, snapshot indices for snapshots.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError<K: Debug = GateKey> {
    /// Input pins with more than one driver.
    #[error("input pins with multiple drivers: {0:?}")]
    MultiDriver(Vec<PinRef<K>>),
    /// Feedback loops made only of combinational gates.
    #[error("combinational cycles with no stateful gate: {0:?}")]
    CombinationalCycle(Vec<Vec<K>>)
}

/// Reasons a snapshot could not be loaded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be parsed.
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    /// A wire refers to a gate index outside the snapshot.
    #[error("wire refers to missing gate #{0}")]
    MissingGate(usize),
    /// A gate's stored port values do not match its kind.
    #[error("gate #{gate} stores {actual} port values, but its kind has {expected}")]
    PortCount {
        /// The gate index.
        gate: usize,
        /// Ports declared by the gate kind.
        expected: usize,
        /// Port values in the snapshot.
        actual: usize
    },
    /// A gate's stored inner state does not match its kind.
    #[error("gate #{0} stores inner state of the wrong kind")]
    InnerState(usize),
    /// The snapshot is structurally invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError<usize>),
    /// A wire could not be connected.
    #[error(transparent)]
    Connection(#[from] ConnectionError)
}
