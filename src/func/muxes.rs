use serde::{Deserialize, Serialize};

use crate::error::{EvalIssue, ParameterOutOfRange};
use crate::func::{Component, PortType, PortUpdate, RunContext, checked_param, pattern_of, port_list};

/// Minimum number of selector bits for a Mux.
pub const MIN_SELSIZE: u8 = 1;
/// Maximum number of selector bits for a Mux.
pub const MAX_SELSIZE: u8 = 6;

/// A multiplexer (mux) component.
///
/// Ports are `selsize` selector bits (least significant first),
/// then `2^selsize` data inputs, then the output.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(try_from = "MuxDef")]
pub struct Mux {
    selsize: u8
}

#[derive(Deserialize)]
struct MuxDef {
    selsize: u8
}
impl TryFrom<MuxDef> for Mux {
    type Error = ParameterOutOfRange;

    fn try_from(def: MuxDef) -> Result<Self, Self::Error> {
        let selsize = checked_param("selsize", def.selsize, MIN_SELSIZE..=MAX_SELSIZE)?;
        Ok(Self { selsize })
    }
}
impl Mux {
    /// Creates a new instance of the Mux with specified selector size.
    pub fn new(selsize: u8) -> Self {
        Self {
            selsize: selsize.clamp(MIN_SELSIZE, MAX_SELSIZE)
        }
    }

    fn input_count(&self) -> usize {
        1 << self.selsize
    }
}
impl Default for Mux {
    fn default() -> Self {
        Self::new(MIN_SELSIZE)
    }
}
impl Component for Mux {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // selector
            (PortType::Input, usize::from(self.selsize)),
            // inputs
            (PortType::Input, self.input_count()),
            // output
            (PortType::Output, 1),
        ])
    }

    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let selsize = usize::from(self.selsize);
        // Selector width matches the input count, so this is always in range.
        let sel = pattern_of(&ctx.new_ports[..selsize]) as usize;

        Ok(vec![PortUpdate {
            index: selsize + self.input_count(),
            value: ctx.new_ports[selsize + sel]
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::run_pure;

    #[test]
    fn test_mux() {
        // use all possible selector sizes
        for selsize in MIN_SELSIZE..=MAX_SELSIZE {
            let sel_count = usize::from(selsize);
            // 2^selsize *data* inputs
            let input_count = 1 << selsize;

            // create mux
            let mux = Mux::new(selsize);
            let props = mux.ports();

            assert_eq!(props.len(), sel_count + input_count + 1, "Mux with selsize {selsize} should have {} ports", sel_count + input_count + 1);
            assert_eq!(props[sel_count + input_count], PortType::Output, "Last Mux port should be an output");
            assert!(
                props[..sel_count + input_count].iter().all(|&p| p == PortType::Input),
                "Mux with selsize {selsize} should have {} input ports", sel_count + input_count
            );

            // test all possible selector values, with only the selected input high
            for sel in 0..input_count {
                let mut ports = vec![false; props.len()];
                for (i, port) in ports[..sel_count].iter_mut().enumerate() {
                    *port = (sel >> i) & 1 != 0;
                }
                ports[sel_count + sel] = true;

                let actual = run_pure(&mux, &ports);
                let expected = Ok(vec![PortUpdate { index: sel_count + input_count, value: true }]);
                assert_eq!(actual, expected, "Mux with selsize {selsize} and selector {sel} should output the selected input");

                // the selected input low, every other input high
                for port in &mut ports[sel_count..sel_count + input_count] {
                    *port = !*port;
                }
                let actual = run_pure(&mux, &ports);
                let expected = Ok(vec![PortUpdate { index: sel_count + input_count, value: false }]);
                assert_eq!(actual, expected, "Mux with selsize {selsize} and selector {sel} should ignore other inputs");
            }
        }
    }

    #[test]
    fn test_deserialize_checks_selsize() {
        let mux: Mux = serde_json::from_str(r#"{ "selsize": 6 }"#).unwrap();
        assert_eq!(mux, Mux::new(6));

        for bad in [r#"{ "selsize": 0 }"#, r#"{ "selsize": 64 }"#] {
            let err = serde_json::from_str::<Mux>(bad).unwrap_err();
            assert!(err.to_string().contains("selsize"), "{err}");
        }
    }
}
