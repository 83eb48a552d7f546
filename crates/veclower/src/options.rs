//! Options controlling which lowering the pattern set performs.

use std::fmt;
use std::str::FromStr;

use crate::contract::ContractionOp;
use crate::error::LoweringError;
use crate::ir::Graph;

/// Strategy used to lower a `contract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContractLowering {
    /// One horizontal reduction per output element.
    #[default]
    Dot,
    /// A chain of outer products along the reduction axis.
    OuterProduct,
    /// Plain elementwise arithmetic; only for unit reduction axes.
    ParallelArith,
    /// Generic peeling only.
    Peeling,
}

impl fmt::Display for ContractLowering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContractLowering::Dot => "dot",
            ContractLowering::OuterProduct => "outerproduct",
            ContractLowering::ParallelArith => "parallelarith",
            ContractLowering::Peeling => "peeling",
        })
    }
}

impl FromStr for ContractLowering {
    type Err = LoweringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot" => Ok(ContractLowering::Dot),
            "outerproduct" => Ok(ContractLowering::OuterProduct),
            "parallelarith" => Ok(ContractLowering::ParallelArith),
            "peeling" => Ok(ContractLowering::Peeling),
            _ => Err(LoweringError::invalid(
                "contract lowering",
                format!("unknown strategy '{s}'"),
            )),
        }
    }
}

/// Predicate deciding whether a contraction may be rewritten at all.
pub type ContractFilter = fn(&Graph, &ContractionOp) -> bool;

/// Configuration of the contraction lowering patterns.
///
/// # Example
///
/// ```
/// use veclower::{ContractLowering, LoweringOptions};
///
/// let options = LoweringOptions::default()
///     .with_contract_lowering(ContractLowering::OuterProduct)
///     .with_outer_product_lowering_disabled(true);
/// assert_eq!(options.contract_lowering, ContractLowering::OuterProduct);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoweringOptions {
    pub contract_lowering: ContractLowering,
    /// Keep `outerproduct` ops instead of expanding them.
    pub disable_outer_product_lowering: bool,
    pub filter: Option<ContractFilter>,
}

impl LoweringOptions {
    pub fn with_contract_lowering(mut self, strategy: ContractLowering) -> Self {
        self.contract_lowering = strategy;
        self
    }

    pub fn with_outer_product_lowering_disabled(mut self, disabled: bool) -> Self {
        self.disable_outer_product_lowering = disabled;
        self
    }

    pub fn with_filter(mut self, filter: ContractFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether the filter (if any) lets `op` be rewritten.
    pub fn accepts(&self, graph: &Graph, op: &ContractionOp) -> bool {
        self.filter.is_none_or(|f| f(graph, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        for s in [
            ContractLowering::Dot,
            ContractLowering::OuterProduct,
            ContractLowering::ParallelArith,
            ContractLowering::Peeling,
        ] {
            assert_eq!(s.to_string().parse::<ContractLowering>().unwrap(), s);
        }
        assert!("matmul".parse::<ContractLowering>().is_err());
    }

    #[test]
    fn test_defaults() {
        let options = LoweringOptions::default();
        assert_eq!(options.contract_lowering, ContractLowering::Dot);
        assert!(!options.disable_outer_product_lowering);
        assert!(options.filter.is_none());
    }
}
