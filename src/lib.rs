#![warn(missing_docs)]
//! Simulation engine for logic gate circuits.
//!
//! A [`Circuit`] is a directed graph of gates (see [`func`]) connected by wires.
//! Combinational logic is converged to a fixed point in delta cycles
//! before time advances, and stateful gates (clocks, flip-flops, latches)
//! update at tick boundaries.
//!
//! ```
//! use gatesim::circuit::Circuit;
//! use gatesim::circuit::graph::PinRef;
//! use gatesim::func::Xor;
//!
//! let mut circuit = Circuit::new();
//! let a = circuit.add_input(true);
//! let b = circuit.add_input(false);
//! let xor = circuit.add_gate(Xor::new(2));
//! let out = circuit.add_output();
//! circuit.connect_all(xor, &[PinRef::new(a, 0), PinRef::new(b, 0)]).unwrap();
//! circuit.connect(PinRef::new(xor, 2), PinRef::new(out, 0)).unwrap();
//!
//! circuit.advance(0).unwrap();
//! assert_eq!(circuit.outputs()[&out], true);
//!
//! circuit.set_input(b, true).unwrap();
//! assert_eq!(circuit.outputs()[&out], false);
//! ```
//!
//! [`Circuit`]: circuit::Circuit

pub mod circuit;
pub mod config;
pub mod error;
pub mod func;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use crate::circuit::Circuit;
    use crate::circuit::graph::{GateKey, PinRef};
    use crate::circuit::state::{Diagnostic, InnerFunctionState};
    use crate::error::{ConnectionError, EvalIssue, OscillationDetected, SetInputError};
    use crate::func::*;

    fn pin(gate: GateKey, index: usize) -> PinRef {
        PinRef::new(gate, index)
    }

    /// Builds a two-input gate between two inputs and an output.
    fn binary(func: impl Into<ComponentFn>) -> (Circuit, GateKey, GateKey, GateKey) {
        let mut circuit = Circuit::new();
        let a = circuit.add_input(false);
        let b = circuit.add_input(false);
        let gate = circuit.add_gate(func);
        let out = circuit.add_output();
        circuit.connect_all(gate, &[pin(a, 0), pin(b, 0)]).unwrap();
        circuit.connect(pin(gate, 2), pin(out, 0)).unwrap();
        circuit.advance(0).unwrap();

        (circuit, a, b, out)
    }

    #[test]
    fn truth_tables() {
        type Op = fn(bool, bool) -> bool;
        let cases: [(ComponentFn, Op); 5] = [
            (And::new(2).into(),  |a, b| a & b),
            (Or::new(2).into(),   |a, b| a | b),
            (Xor::new(2).into(),  |a, b| a ^ b),
            (Nand::new(2).into(), |a, b| !(a & b)),
            (Nor::new(2).into(),  |a, b| !(a | b)),
        ];

        for (func, op) in cases {
            let (mut circuit, a, b, out) = binary(func.clone());
            for (x, y) in [(false, false), (false, true), (true, false), (true, true)] {
                circuit.set_input(a, x).unwrap();
                circuit.set_input(b, y).unwrap();
                assert_eq!(circuit.outputs()[&out], op(x, y), "{func:?} failed on ({x}, {y})");
            }
        }
    }

    #[test]
    fn not_gate() {
        let mut circuit = Circuit::new();
        let a = circuit.add_input(false);
        let not = circuit.add_gate(Not::new());
        let out = circuit.add_output();
        circuit.connect_all(not, &[pin(a, 0)]).unwrap();
        circuit.connect(pin(not, 1), pin(out, 0)).unwrap();

        circuit.advance(0).unwrap();
        assert_eq!(circuit.outputs()[&out], true);
        circuit.set_input(a, true).unwrap();
        assert_eq!(circuit.outputs()[&out], false);
    }

    #[test]
    fn half_adder() {
        let mut circuit = Circuit::new();
        let a = circuit.add_input(false);
        let b = circuit.add_input(false);
        let xor = circuit.add_gate(Xor::new(2));
        let and = circuit.add_gate(And::new(2));
        let sum = circuit.add_output();
        let carry = circuit.add_output();
        circuit.connect_all(xor, &[pin(a, 0), pin(b, 0)]).unwrap();
        circuit.connect_all(and, &[pin(a, 0), pin(b, 0)]).unwrap();
        circuit.connect(pin(xor, 2), pin(sum, 0)).unwrap();
        circuit.connect(pin(and, 2), pin(carry, 0)).unwrap();

        for (x, y) in [(false, false), (false, true), (true, false), (true, true)] {
            circuit.set_input(a, x).unwrap();
            circuit.set_input(b, y).unwrap();

            let outputs = circuit.outputs();
            let total = u8::from(x) + u8::from(y);
            assert_eq!(outputs[&sum], total & 1 != 0, "sum of {x} + {y}");
            assert_eq!(outputs[&carry], total & 2 != 0, "carry of {x} + {y}");
        }
    }

    #[test]
    fn mux_select() {
        let mut circuit = Circuit::new();
        let sel = circuit.add_input(false);
        let lo = circuit.add_input(false);
        let hi = circuit.add_input(true);
        let mux = circuit.add_gate(Mux::new(1));
        let out = circuit.add_output();
        circuit.connect_all(mux, &[pin(sel, 0), pin(lo, 0), pin(hi, 0)]).unwrap();
        circuit.connect(pin(mux, 3), pin(out, 0)).unwrap();

        circuit.advance(0).unwrap();
        assert_eq!(circuit.outputs()[&out], false);
        circuit.set_input(sel, true).unwrap();
        assert_eq!(circuit.outputs()[&out], true);
    }

    #[test]
    fn dff_edge() {
        let mut circuit = Circuit::new();
        let d = circuit.add_input(false);
        let clk = circuit.add_input(false);
        let dff = circuit.add_gate(DFlipFlop::new());
        circuit.connect_all(dff, &[pin(d, 0), pin(clk, 0)]).unwrap();
        circuit.advance(0).unwrap();

        // d changes without a clock edge: held
        circuit.set_input(d, true).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(false));
        assert_eq!(circuit.pin_value(dff, 3), Some(true));

        // rising edge: latched
        circuit.set_input(clk, true).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(true));
        assert_eq!(circuit.pin_value(dff, 3), Some(false));

        // d changes while clock is high: held
        circuit.set_input(d, false).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(true));

        // falling edge: held
        circuit.set_input(clk, false).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(true));

        // rising edge: latched
        circuit.set_input(clk, true).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(false));
    }

    #[test]
    fn dff_ignores_clock_glitch() {
        // a rising a pulses AND(a, NOT a) for one delta cycle before NOT catches up
        let mut circuit = Circuit::new();
        let d = circuit.add_input(true);
        let a = circuit.add_input(false);
        let not = circuit.add_gate(Not::new());
        let and = circuit.add_gate(And::new(2));
        let dff = circuit.add_gate(DFlipFlop::new());
        circuit.connect(pin(a, 0), pin(not, 0)).unwrap();
        circuit.connect_all(and, &[pin(a, 0), pin(not, 1)]).unwrap();
        circuit.connect_all(dff, &[pin(d, 0), pin(and, 2)]).unwrap();
        circuit.advance(0).unwrap();

        let report = circuit.set_input(a, true).unwrap();
        assert!(report.passes > 3, "the glitch reached the flip-flop");
        assert_eq!(circuit.pin_value(and, 2), Some(false));
        assert_eq!(circuit.pin_value(dff, 2), Some(false));
        assert_eq!(circuit.pin_value(dff, 3), Some(true));

        circuit.set_input(a, false).unwrap();
        assert_eq!(circuit.pin_value(dff, 2), Some(false));
    }

    #[test]
    fn clock_divider() {
        // Q feeds back into D through Q', so Q toggles on every rising edge.
        let mut circuit = Circuit::new();
        let clock = circuit.add_gate(Clock::new(1));
        let dff = circuit.add_gate(DFlipFlop::new());
        let out = circuit.add_output();
        circuit.connect_all(dff, &[pin(dff, 3), pin(clock, 0)]).unwrap();
        circuit.connect(pin(dff, 2), pin(out, 0)).unwrap();
        assert!(circuit.validate().is_ok());

        let report = circuit.advance(4).unwrap();
        let q: Vec<_> = report.ticks.iter()
            .map(|record| record.outputs[&out])
            .collect();
        assert_eq!(q, [true, true, false, false]);
        assert_eq!(circuit.tick(), 4);
    }

    #[test]
    fn shift_register() {
        let mut circuit = Circuit::new();
        let data = circuit.add_input(true);
        let clock = circuit.add_gate(Clock::new(1));
        let stages: Vec<_> = (0..3).map(|_| circuit.add_gate(DFlipFlop::new())).collect();

        let mut prev = pin(data, 0);
        for &stage in &stages {
            circuit.connect_all(stage, &[prev, pin(clock, 0)]).unwrap();
            prev = pin(stage, 2);
        }
        let read = |circuit: &Circuit| -> Vec<bool> {
            stages.iter().map(|&s| circuit.pin_value(s, 2).unwrap()).collect()
        };

        // each rising edge moves the bit one stage
        circuit.advance(1).unwrap();
        assert_eq!(read(&circuit), [true, false, false]);
        circuit.set_input(data, false).unwrap();
        circuit.advance(2).unwrap();
        assert_eq!(read(&circuit), [false, true, false]);
        circuit.advance(2).unwrap();
        assert_eq!(read(&circuit), [false, false, true]);
        circuit.advance(2).unwrap();
        assert_eq!(read(&circuit), [false, false, false]);
    }

    #[test]
    fn nand_latch_settles() {
        let mut circuit = Circuit::new();
        let inp = circuit.add_input(false);
        let n1 = circuit.add_gate(Nand::new(2));
        let n2 = circuit.add_gate(Nand::new(2));
        circuit.connect_all(n1, &[pin(inp, 0), pin(n2, 2)]).unwrap();
        circuit.connect_all(n2, &[pin(inp, 0), pin(n1, 2)]).unwrap();

        circuit.advance(0).unwrap();
        assert_eq!(circuit.pin_value(n1, 2), Some(true));
        assert_eq!(circuit.pin_value(n2, 2), Some(true));
        assert!(!circuit.validate().is_ok(), "cycle without a stateful gate");
    }

    #[test]
    fn sr_latch_illegal_state() {
        let mut circuit = Circuit::new();
        let s = circuit.add_input(false);
        let r = circuit.add_input(false);
        let latch = circuit.add_gate(SrLatch::new());
        circuit.connect_all(latch, &[pin(s, 0), pin(r, 0)]).unwrap();
        circuit.advance(0).unwrap();

        let report = circuit.set_input(s, true).unwrap();
        assert!(report.diagnostics.is_empty());
        assert_eq!(circuit.pin_value(latch, 2), Some(true));

        let report = circuit.set_input(r, true).unwrap();
        assert_eq!(report.diagnostics, [Diagnostic { tick: 0, gate: latch, issue: EvalIssue::IllegalLatchState }]);
        assert_eq!(circuit.pin_value(latch, 2), Some(true));
        assert_eq!(circuit.pin_value(latch, 3), Some(false));

        circuit.set_input(s, false).unwrap();
        assert_eq!(circuit.pin_value(latch, 2), Some(false));
    }

    #[test]
    fn custom_undefined_entry() {
        let spec = CustomGateSpec::new("partial", 2, 1, [(0b00, 1), (0b01, 0), (0b10, 0)]).unwrap();
        let (mut circuit, a, b, out) = binary(Custom::new(spec));
        assert_eq!(circuit.outputs()[&out], true);

        circuit.set_input(a, true).unwrap();
        assert_eq!(circuit.outputs()[&out], false);

        let report = circuit.set_input(b, true).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].issue, EvalIssue::UndefinedTruthTableEntry { pattern: 0b11 });
        assert_eq!(circuit.outputs()[&out], false, "outputs are held");
    }

    #[test]
    fn not_self_loop() {
        let mut circuit = Circuit::new();
        let not = circuit.add_gate(Not::new());
        circuit.connect(pin(not, 1), pin(not, 0)).unwrap();

        let report = circuit.validate();
        assert_eq!(report.combinational_cycles, [vec![not]]);

        let err = circuit.advance(1).unwrap_err();
        assert_eq!(err.gate, not);
        assert_eq!(err.tick, 0);
        assert_eq!(circuit.tick(), 0);
    }

    #[test]
    fn oscillation_rolls_back() {
        // en = 1 turns a NAND into an inverter on its own output
        let mut circuit = Circuit::new();
        let en = circuit.add_input(false);
        let nand = circuit.add_gate(Nand::new(2));
        let out = circuit.add_output();
        circuit.connect_all(nand, &[pin(en, 0), pin(nand, 2)]).unwrap();
        circuit.connect(pin(nand, 2), pin(out, 0)).unwrap();
        circuit.advance(2).unwrap();
        let before = circuit.snapshot();

        let err = circuit.set_input(en, true).unwrap_err();
        assert!(matches!(err, SetInputError::Oscillation(OscillationDetected { tick: 2, .. })));
        assert_eq!(circuit.snapshot(), before);
        assert_eq!(circuit.outputs()[&out], true);

        // the circuit is still usable
        circuit.advance(1).unwrap();
        assert_eq!(circuit.tick(), 3);
    }

    #[test]
    fn clocked_oscillation_rolls_back_one_tick() {
        // the clock's first high level turns the NAND into an inverter on its own output
        let build = || {
            let mut circuit = Circuit::new();
            let clock = circuit.add_gate(Clock::new(3));
            let nand = circuit.add_gate(Nand::new(2));
            let out = circuit.add_output();
            circuit.connect_all(nand, &[pin(clock, 0), pin(nand, 2)]).unwrap();
            circuit.connect(pin(nand, 2), pin(out, 0)).unwrap();
            (circuit, clock, out)
        };
        let (mut circuit, clock, out) = build();

        let err = circuit.advance(5).unwrap_err();
        assert_eq!(err.tick, 3);
        assert_eq!(circuit.tick(), 2);
        assert_eq!(
            circuit.state().get(clock).and_then(|s| s.inner()),
            Some(&InnerFunctionState::Clock(ClockState { phase: 2, level: false }))
        );
        assert_eq!(circuit.outputs()[&out], true);

        // the same as a circuit which only ever ran the good ticks
        let (mut good, _, _) = build();
        let records = good.advance(2).unwrap().ticks;
        assert_eq!(circuit.snapshot(), good.snapshot());
        assert_eq!(records.last().map(|r| &r.outputs), Some(&circuit.outputs()));

        // retrying fails at the same tick
        assert_eq!(circuit.advance(1).unwrap_err().tick, 3);
        assert_eq!(circuit.tick(), 2);
    }

    #[test]
    fn multi_driver_rejected() {
        let mut circuit = Circuit::new();
        let a = circuit.add_input(false);
        let b = circuit.add_input(true);
        let out = circuit.add_output();
        circuit.connect(pin(a, 0), pin(out, 0)).unwrap();

        assert_eq!(
            circuit.connect(pin(b, 0), pin(out, 0)),
            Err(ConnectionError::AlreadyDriven { pin: pin(out, 0), driver: pin(a, 0) })
        );
        circuit.advance(0).unwrap();
        assert_eq!(circuit.outputs()[&out], false);
    }

    /// A random combinational circuit: each gate reads from earlier gates or inputs.
    fn random_circuit(n_inputs: usize, gates: &[(u8, usize, usize)]) -> (Circuit, Vec<GateKey>, Vec<GateKey>) {
        let mut circuit = Circuit::new();
        let inputs: Vec<_> = (0..n_inputs).map(|_| circuit.add_input(false)).collect();
        let mut sources: Vec<_> = inputs.iter().map(|&k| pin(k, 0)).collect();

        for &(kind, x, y) in gates {
            let func: ComponentFn = match kind % 6 {
                0 => And::new(2).into(),
                1 => Or::new(2).into(),
                2 => Xor::new(2).into(),
                3 => Nand::new(2).into(),
                4 => Nor::new(2).into(),
                _ => Not::new().into(),
            };
            let n_in = func.ports().len() - 1;
            let gate = circuit.add_gate(func);
            let drivers = [sources[x % sources.len()], sources[y % sources.len()]];
            circuit.connect_all(gate, &drivers[..n_in]).unwrap();
            sources.push(pin(gate, n_in));
        }

        let outputs = sources[n_inputs..].iter()
            .map(|&src| {
                let out = circuit.add_output();
                circuit.connect(src, pin(out, 0)).unwrap();
                out
            })
            .collect();
        (circuit, inputs, outputs)
    }

    fn read_outputs(circuit: &Circuit, outputs: &[GateKey]) -> Vec<bool> {
        let values: BTreeMap<_, _> = circuit.outputs();
        outputs.iter().map(|k| values[k]).collect()
    }

    proptest! {
        #[test]
        fn convergence_is_idempotent(
            gates in prop::collection::vec((any::<u8>(), any::<usize>(), any::<usize>()), 1..24),
            values in prop::collection::vec(any::<bool>(), 3)
        ) {
            let (mut circuit, inputs, outputs) = random_circuit(3, &gates);
            circuit.advance(0).unwrap();
            for (&input, &value) in inputs.iter().zip(&values) {
                circuit.set_input(input, value).unwrap();
            }

            let settled = read_outputs(&circuit, &outputs);
            let report = circuit.propagate().unwrap();
            prop_assert_eq!(report.passes, 0);
            prop_assert_eq!(report.evaluations, 0);
            prop_assert_eq!(read_outputs(&circuit, &outputs), settled);
        }

        #[test]
        fn simulation_is_deterministic(
            gates in prop::collection::vec((any::<u8>(), any::<usize>(), any::<usize>()), 1..24),
            steps in prop::collection::vec((0..3usize, any::<bool>()), 0..12)
        ) {
            let run = || {
                let (mut circuit, inputs, outputs) = random_circuit(3, &gates);
                let mut trace = vec![];
                circuit.advance(0).unwrap();
                for &(i, value) in &steps {
                    circuit.set_input(inputs[i], value).unwrap();
                    trace.push(read_outputs(&circuit, &outputs));
                }
                trace
            };
            prop_assert_eq!(run(), run());
        }
    }
}
