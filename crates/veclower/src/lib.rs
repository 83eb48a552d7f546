//! veclower - progressive lowering of vector contractions
//!
//! This crate rewrites a generalized contraction (`contract`: a
//! multiply-accumulate over labelled vector axes) into elementary vector
//! operations: extract, insert, broadcast, transpose, fma and horizontal
//! reductions.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Driver (patterns module)
//!     → PatternSet, apply_patterns
//!
//! Level 2: Rewrites (lowering module)
//!     → outer products, dot products, elementwise, peeling
//!     → outerproduct expansion
//!
//! Level 3: Value graph (ir module)
//!     → typed builder, use replacement, checkpoint/rollback
//!     → reference evaluator (interp module)
//! ```
//!
//! # Example
//!
//! ```
//! use veclower::indexing::{IndexMap, IteratorType};
//! use veclower::{
//!     ContractionOp, ElementType, Evaluator, Graph, Literal, LoweringOptions, PatternSet,
//!     Scalar, Type, apply_patterns,
//! };
//!
//! // c[i] += a[i, k] * b[k]
//! let mut g = Graph::new();
//! let a = g.argument("a", Type::vector(&[2, 2], ElementType::I32));
//! let b = g.argument("b", Type::vector(&[2], ElementType::I32));
//! let c = g.argument("c", Type::vector(&[2], ElementType::I32));
//! let maps = IndexMap::infer_from_lists(&[&[0, 1], &[1], &[0]]);
//! let iters = vec![IteratorType::Parallel, IteratorType::Reduction];
//! let r = g.contract(ContractionOp::new(a, b, Some(c), maps, iters)).unwrap();
//! g.add_output(r);
//!
//! let report = apply_patterns(&mut g, &PatternSet::contract_lowering(LoweringOptions::default()));
//! assert!(report.is_complete());
//!
//! let int = |ty: Type, v: &[i64]| Literal::from_vec(ty, v.iter().map(|&x| Scalar::Int(x)).collect()).unwrap();
//! let mut ev = Evaluator::new(&g);
//! ev.bind("a", int(Type::vector(&[2, 2], ElementType::I32), &[1, 2, 3, 4]));
//! ev.bind("b", int(Type::vector(&[2], ElementType::I32), &[1, 1]));
//! ev.bind("c", int(Type::vector(&[2], ElementType::I32), &[10, 20]));
//! let out = ev.eval(g.output(0)).unwrap();
//! assert_eq!(out.data(), &[Scalar::Int(13), Scalar::Int(27)]);
//! ```

pub mod combining;
pub mod contract;
pub mod error;
pub mod indexing;
pub mod interp;
pub mod ir;
pub mod literal;
pub mod lowering;
pub mod options;
pub mod patterns;
pub mod scalar;
pub mod strides;
pub mod types;

pub use combining::CombiningKind;
pub use contract::{ContractionDims, ContractionOp};
pub use error::LoweringError;
pub use interp::Evaluator;
pub use ir::{Graph, OpId, OpKind, OuterProductOp, ValueId};
pub use literal::Literal;
pub use lowering::{PeelPlan, PeelState, PeelStep};
pub use options::{ContractFilter, ContractLowering, LoweringOptions};
pub use patterns::{LoweringReport, Pattern, PatternSet, apply_patterns};
pub use scalar::Scalar;
pub use types::{ElementType, Type};
