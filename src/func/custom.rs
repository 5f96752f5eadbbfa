use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DefineGateError, EvalIssue};
use crate::func::{Component, PortType, PortUpdate, RunContext, pattern_of, port_list};

/// Maximum number of input or output pins on a custom gate.
pub const MAX_CUSTOM_PINS: u8 = 64;
/// Maximum number of inputs accepted by [`CustomGateSpec::from_fn`],
/// which enumerates every input pattern.
pub const MAX_ENUMERATED_INPUTS: u8 = 16;

/// A user-defined truth table.
///
/// Patterns are little-endian: bit `i` of an input pattern is input `i`,
/// and bit `j` of an output pattern is output `j`.
/// Input patterns missing from the table are undefined.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "CustomGateSpecDef")]
pub struct CustomGateSpec {
    name: String,
    n_inputs: u8,
    n_outputs: u8,
    table: BTreeMap<u64, u64>
}

/// Unchecked serialized form of a [`CustomGateSpec`].
#[derive(Deserialize)]
struct CustomGateSpecDef {
    name: String,
    n_inputs: u8,
    n_outputs: u8,
    table: BTreeMap<u64, u64>
}
impl TryFrom<CustomGateSpecDef> for CustomGateSpec {
    type Error = DefineGateError;

    fn try_from(def: CustomGateSpecDef) -> Result<Self, Self::Error> {
        Self::checked(def.name, def.n_inputs, def.n_outputs, def.table)
    }
}

/// Whether `pattern` fits into `width` bits.
fn fits(pattern: u64, width: u8) -> bool {
    width >= 64 || pattern >> width == 0
}

impl CustomGateSpec {
    /// Defines a custom gate from its truth table.
    ///
    /// This fails if the arity is out of range
    /// or if any pattern does not fit in the declared number of pins.
    ///
    /// ```
    /// use gatesim::func::CustomGateSpec;
    ///
    /// // A 2-input, 1-output gate that only defines the patterns where input 1 is low.
    /// let spec = CustomGateSpec::new("partial", 2, 1, [(0b00, 0), (0b01, 1)]).unwrap();
    /// assert_eq!(spec.lookup(0b01), Some(1));
    /// assert_eq!(spec.lookup(0b11), None);
    /// ```
    pub fn new(
        name: impl Into<String>,
        n_inputs: u8,
        n_outputs: u8,
        table: impl IntoIterator<Item = (u64, u64)>
    ) -> Result<Arc<Self>, DefineGateError> {
        Self::checked(name.into(), n_inputs, n_outputs, table.into_iter().collect()).map(Arc::new)
    }

    /// Defines a fully specified custom gate by evaluating `f` on every input pattern.
    ///
    /// Output bits beyond `n_outputs` are discarded.
    pub fn from_fn(
        name: impl Into<String>,
        n_inputs: u8,
        n_outputs: u8,
        f: impl Fn(u64) -> u64
    ) -> Result<Arc<Self>, DefineGateError> {
        if n_inputs > MAX_ENUMERATED_INPUTS {
            return Err(DefineGateError::Arity { n_inputs, n_outputs });
        }
        let mask = match n_outputs {
            64.. => u64::MAX,
            n => (1 << n) - 1
        };
        let table = (0..1u64 << n_inputs)
            .map(|pattern| (pattern, f(pattern) & mask))
            .collect();

        Self::checked(name.into(), n_inputs, n_outputs, table).map(Arc::new)
    }

    fn checked(name: String, n_inputs: u8, n_outputs: u8, table: BTreeMap<u64, u64>) -> Result<Self, DefineGateError> {
        if n_inputs > MAX_CUSTOM_PINS || n_outputs == 0 || n_outputs > MAX_CUSTOM_PINS {
            return Err(DefineGateError::Arity { n_inputs, n_outputs });
        }
        for (&input, &output) in &table {
            if !fits(input, n_inputs) {
                return Err(DefineGateError::InputPatternOutOfRange { pattern: input, n_inputs });
            }
            if !fits(output, n_outputs) {
                return Err(DefineGateError::OutputPatternOutOfRange { pattern: input, output, n_outputs });
            }
        }

        Ok(Self { name, n_inputs, n_outputs, table })
    }

    /// The name of this gate.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The number of input pins.
    pub fn n_inputs(&self) -> u8 {
        self.n_inputs
    }
    /// The number of output pins.
    pub fn n_outputs(&self) -> u8 {
        self.n_outputs
    }
    /// Looks up the output pattern for an input pattern.
    pub fn lookup(&self, pattern: u64) -> Option<u64> {
        self.table.get(&pattern).copied()
    }
}

/// A gate evaluated from a [`CustomGateSpec`].
///
/// The definition is shared, so many gates can be instantiated from one definition.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct Custom {
    spec: Arc<CustomGateSpec>
}
impl Custom {
    /// Creates a new gate instance of the custom definition.
    pub fn new(spec: Arc<CustomGateSpec>) -> Self {
        Self { spec }
    }

    /// The definition this gate evaluates.
    pub fn spec(&self) -> &Arc<CustomGateSpec> {
        &self.spec
    }
}
impl Component for Custom {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // inputs
            (PortType::Input, usize::from(self.spec.n_inputs)),
            // outputs
            (PortType::Output, usize::from(self.spec.n_outputs)),
        ])
    }

    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let n_inputs = usize::from(self.spec.n_inputs);
        let pattern = pattern_of(&ctx.new_ports[..n_inputs]);
        let output = self.spec.lookup(pattern)
            .ok_or(EvalIssue::UndefinedTruthTableEntry { pattern })?;

        Ok((0..usize::from(self.spec.n_outputs))
            .map(|j| PortUpdate { index: n_inputs + j, value: (output >> j) & 1 != 0 })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::run_pure;

    #[test]
    fn test_full_adder() {
        // inputs: a, b, cin; outputs: sum, cout
        let spec = CustomGateSpec::from_fn("full adder", 3, 2, |p| p.count_ones() as u64).unwrap();
        let adder = Custom::new(spec);
        assert_eq!(adder.ports().len(), 5);

        for pattern in 0..8u64 {
            let mut ports = vec![false; 5];
            for (i, port) in ports[..3].iter_mut().enumerate() {
                *port = (pattern >> i) & 1 != 0;
            }
            let total = pattern.count_ones();
            let expected = Ok(vec![
                PortUpdate { index: 3, value: total & 1 != 0 },
                PortUpdate { index: 4, value: total & 2 != 0 },
            ]);
            assert_eq!(run_pure(&adder, &ports), expected, "Full adder failed on pattern {pattern:03b}");
        }
    }

    #[test]
    fn test_undefined_entry() {
        let spec = CustomGateSpec::new("partial", 2, 1, [(0b00, 0), (0b01, 1)]).unwrap();
        let gate = Custom::new(spec);

        assert_eq!(run_pure(&gate, &[true, false, false]), Ok(vec![PortUpdate { index: 2, value: true }]));
        assert_eq!(
            run_pure(&gate, &[true, true, false]),
            Err(EvalIssue::UndefinedTruthTableEntry { pattern: 0b11 })
        );
    }

    #[test]
    fn test_define_errors() {
        assert_eq!(
            CustomGateSpec::new("bad", 2, 1, [(0b100, 0)]),
            Err(DefineGateError::InputPatternOutOfRange { pattern: 0b100, n_inputs: 2 })
        );
        assert_eq!(
            CustomGateSpec::new("bad", 1, 1, [(0b1, 0b10)]),
            Err(DefineGateError::OutputPatternOutOfRange { pattern: 0b1, output: 0b10, n_outputs: 1 })
        );
        assert_eq!(
            CustomGateSpec::new("bad", 1, 0, []),
            Err(DefineGateError::Arity { n_inputs: 1, n_outputs: 0 })
        );
        assert!(CustomGateSpec::from_fn("huge", 17, 1, |_| 0).is_err());
    }

    #[test]
    fn test_constant_gate() {
        // no inputs: the empty pattern is the only one
        let spec = CustomGateSpec::new("one", 0, 1, [(0, 1)]).unwrap();
        let gate = Custom::new(spec);
        assert_eq!(run_pure(&gate, &[false]), Ok(vec![PortUpdate { index: 0, value: true }]));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"name":"bad","n_inputs":1,"n_outputs":1,"table":{"4":0}}"#;
        assert!(serde_json::from_str::<CustomGateSpec>(json).is_err());

        let json = r#"{"name":"buf","n_inputs":1,"n_outputs":1,"table":{"0":0,"1":1}}"#;
        let spec: CustomGateSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.lookup(1), Some(1));
    }
}
