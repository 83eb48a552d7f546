//! Shared helpers: building layout contractions, random arguments, and
//! checking a lowered graph against the evaluator's naive contraction.

#![allow(dead_code)]

use approx::assert_relative_eq;
use rand::Rng;
use rand::rngs::StdRng;
use veclower::contract::{LayoutEntry, LayoutFamily, Role};
use veclower::indexing::IndexMap;
use veclower::{
    ContractionOp, ElementType, Evaluator, Graph, Literal, LoweringOptions, LoweringReport, OpKind,
    PatternSet, Scalar, Type, ValueId, apply_patterns,
};

/// Extents of the `M`, `N` and `K` roles.
#[derive(Debug, Clone, Copy)]
pub struct Sizes {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl Sizes {
    pub fn random(rng: &mut StdRng) -> Self {
        Self {
            m: rng.random_range(1..=8),
            n: rng.random_range(1..=8),
            k: rng.random_range(1..=8),
        }
    }

    fn extent(&self, role: Role) -> usize {
        match role {
            Role::M => self.m,
            Role::N => self.n,
            Role::K => self.k,
        }
    }
}

fn layout_type(roles: &[Role], sizes: Sizes, element: ElementType) -> Type {
    let shape: Vec<usize> = roles.iter().map(|&r| sizes.extent(r)).collect();
    Type::vector(&shape, element)
}

/// The contraction of one layout-table row, with arguments `a`, `b`, and
/// `c` when `with_acc`.
pub fn layout_contraction(
    g: &mut Graph,
    entry: &LayoutEntry,
    sizes: Sizes,
    element: ElementType,
    with_acc: bool,
) -> ContractionOp {
    let num_dims = entry.family.iterators().len();
    let map = |roles: &[Role]| {
        let labels: Vec<usize> = roles.iter().map(|&r| entry.family.label(r)).collect();
        IndexMap::new(num_dims, &labels)
    };
    let a = g.argument("a", layout_type(entry.lhs, sizes, element));
    let b = g.argument("b", layout_type(entry.rhs, sizes, element));
    let c = with_acc.then(|| g.argument("c", layout_type(entry.acc, sizes, element)));
    ContractionOp::new(
        a,
        b,
        c,
        [map(entry.lhs), map(entry.rhs), map(entry.acc)],
        entry.family.iterators().to_vec(),
    )
}

pub fn is_matmat(entry: &&LayoutEntry) -> bool {
    entry.family == LayoutFamily::Matmat
}

/// Random integer-valued literal of `ty`; `i1` values are 0 or 1.
pub fn random_literal(rng: &mut StdRng, ty: &Type) -> Literal {
    let element = ty.element_type();
    let data = (0..ty.num_elements())
        .map(|_| {
            if element == ElementType::I1 {
                Scalar::Int(rng.random_range(0..=1))
            } else if element.is_float() {
                Scalar::Float(rng.random_range(-4i64..=4) as f64)
            } else {
                Scalar::Int(rng.random_range(-4..=4))
            }
        })
        .collect();
    Literal::from_vec(ty.clone(), data).unwrap()
}

/// Random values for every argument of `g`.
pub fn random_bindings(g: &Graph, rng: &mut StdRng) -> Vec<(String, Literal)> {
    g.live_ops()
        .filter_map(|id| match g.op(id).kind() {
            OpKind::Argument { name } => {
                Some((name.clone(), random_literal(rng, g.op(id).result_type())))
            }
            _ => None,
        })
        .collect()
}

pub fn eval_outputs(g: &Graph, bindings: &[(String, Literal)]) -> Vec<Literal> {
    let mut ev = Evaluator::new(g);
    for (name, literal) in bindings {
        ev.bind(name.as_str(), literal.clone());
    }
    ev.eval_outputs().unwrap()
}

pub fn assert_literal_eq(actual: &Literal, expected: &Literal) {
    assert_eq!(actual.ty(), expected.ty());
    for (a, e) in actual.data().iter().zip(expected.data()) {
        match (a, e) {
            (Scalar::Float(a), Scalar::Float(e)) => assert_relative_eq!(*a, *e, epsilon = 1e-9),
            _ => assert_eq!(a, e),
        }
    }
}

/// Lower a copy of `g` with `options` and check every output against the
/// unlowered graph on random arguments.
pub fn check_lowering(g: &Graph, options: LoweringOptions, rng: &mut StdRng) -> LoweringReport {
    let bindings = random_bindings(g, rng);
    let expected = eval_outputs(g, &bindings);

    let mut lowered = g.clone();
    let report = apply_patterns(&mut lowered, &PatternSet::contract_lowering(options));
    assert!(
        report.is_complete(),
        "lowering incomplete: {:?}\n{lowered}",
        report
    );
    let actual = eval_outputs(&lowered, &bindings);
    for (a, e) in actual.iter().zip(&expected) {
        assert_literal_eq(a, e);
    }
    report
}

/// Add the contraction to `g` and register it as the output.
pub fn contract_output(g: &mut Graph, op: ContractionOp) -> ValueId {
    let r = g.contract(op).unwrap();
    g.add_output(r);
    r
}

/// Number of `contract` and `outerproduct` ops left in `g`.
pub fn remaining_high_level(g: &Graph) -> usize {
    g.count_ops(|k| matches!(k, OpKind::Contract(_) | OpKind::OuterProduct(_)))
}
