//! Reference evaluator for value graphs.
//!
//! Evaluates values in dependency order with bound [`Literal`] arguments.
//! `contract` is evaluated by a naive loop over its iteration domain, which
//! makes the evaluator the oracle the lowerings are checked against.
//!
//! # Example
//!
//! ```
//! use veclower::{ElementType, Evaluator, Graph, Literal, Scalar, Type};
//! use veclower::combining::BinaryOp;
//!
//! let ty = Type::vector(&[2], ElementType::I32);
//! let mut g = Graph::new();
//! let a = g.argument("a", ty.clone());
//! let sum = g.binary(BinaryOp::AddI, a, a).unwrap();
//!
//! let mut ev = Evaluator::new(&g);
//! ev.bind("a", Literal::from_vec(ty, vec![Scalar::Int(1), Scalar::Int(2)]).unwrap());
//! let out = ev.eval(sum).unwrap();
//! assert_eq!(out.data(), &[Scalar::Int(2), Scalar::Int(4)]);
//! ```

use std::collections::HashMap;

use crate::combining::BinaryOp;
use crate::contract::ContractionOp;
use crate::error::LoweringError;
use crate::indexing::IndexMap;
use crate::ir::{ConstantValue, Graph, OpId, OpKind, OuterProductOp, ValueId};
use crate::literal::Literal;
use crate::strides::linear_to_cartesian;
use crate::types::Type;

/// Evaluates values of one graph.
#[derive(Debug)]
pub struct Evaluator<'g> {
    graph: &'g Graph,
    bindings: HashMap<String, Literal>,
    values: HashMap<OpId, Literal>,
}

impl<'g> Evaluator<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            bindings: HashMap::new(),
            values: HashMap::new(),
        }
    }

    /// Bind the value of the argument called `name`.
    pub fn bind(&mut self, name: impl Into<String>, value: Literal) {
        self.bindings.insert(name.into(), value);
        self.values.clear();
    }

    /// Value of `value`, evaluating whatever it depends on.
    pub fn eval(&mut self, value: ValueId) -> Result<Literal, LoweringError> {
        for id in self.graph.topological_order(&[value])? {
            if !self.values.contains_key(&id) {
                let literal = self.eval_op(id)?;
                self.values.insert(id, literal);
            }
        }
        self.values
            .get(&value.defining_op())
            .cloned()
            .ok_or(LoweringError::ErasedValue {
                index: value.index(),
            })
    }

    /// Values of all graph outputs.
    pub fn eval_outputs(&mut self) -> Result<Vec<Literal>, LoweringError> {
        let outputs = self.graph.outputs().to_vec();
        outputs.into_iter().map(|v| self.eval(v)).collect()
    }

    fn get(&self, value: ValueId) -> Result<&Literal, LoweringError> {
        self.values
            .get(&value.defining_op())
            .ok_or(LoweringError::ErasedValue {
                index: value.index(),
            })
    }

    fn get_opt(&self, value: Option<ValueId>) -> Result<Option<&Literal>, LoweringError> {
        value.map(|v| self.get(v)).transpose()
    }

    fn eval_op(&self, id: OpId) -> Result<Literal, LoweringError> {
        let op = self.graph.op(id);
        let ty = op.result_type().clone();
        let element = ty.element_type();
        match op.kind() {
            OpKind::Argument { name } => {
                let bound = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| LoweringError::UnboundArgument { name: name.clone() })?;
                if bound.ty() != &ty {
                    return Err(LoweringError::invalid(
                        "argument",
                        format!("'{name}' is bound to {} but declared {ty}", bound.ty()),
                    ));
                }
                Ok(bound.clone())
            }
            OpKind::Constant(ConstantValue::Splat(v)) => Ok(Literal::splat(*v, ty)),
            OpKind::Constant(ConstantValue::Dense(data)) => Literal::from_vec(ty, data.clone()),
            OpKind::Extract { source, position } => self.get(*source)?.extract(position),
            OpKind::Insert {
                value,
                dest,
                position,
            } => self.get(*dest)?.insert(self.get(*value)?, position),
            OpKind::Broadcast { source } => self.get(*source)?.broadcast_to(ty),
            OpKind::Transpose {
                source,
                permutation,
            } => self.get(*source)?.transpose(permutation),
            OpKind::Extend { source } => Ok(self.get(*source)?.map(ty, |v| v)),
            OpKind::Binary { op, lhs, rhs } => self
                .get(*lhs)?
                .zip_with(self.get(*rhs)?, |a, b| op.apply(a, b, element)),
            OpKind::Fma { lhs, rhs, acc } => {
                let product = self
                    .get(*lhs)?
                    .zip_with(self.get(*rhs)?, |a, b| BinaryOp::MulF.apply(a, b, element))?;
                product.zip_with(self.get(*acc)?, |p, c| BinaryOp::AddF.apply(p, c, element))
            }
            OpKind::Select {
                condition,
                true_value,
                false_value,
            } => {
                let cond = self.get(*condition)?;
                let on_true = self.get(*true_value)?;
                let on_false = self.get(*false_value)?;
                let data = cond
                    .data()
                    .iter()
                    .zip(on_true.data().iter().zip(on_false.data()))
                    .map(|(c, (&t, &f))| if c.is_true() { t } else { f })
                    .collect();
                Literal::from_vec(ty, data)
            }
            OpKind::Reduction {
                kind,
                vector,
                acc,
                mask,
            } => {
                let vector = self.get(*vector)?;
                let mut result = match self.get_opt(*acc)? {
                    Some(acc) => acc.as_scalar()?,
                    None => kind.identity(element),
                };
                let mask = self.get_opt(*mask)?;
                for (i, &v) in vector.data().iter().enumerate() {
                    if mask.is_some_and(|m| !m.data()[i].is_true()) {
                        continue;
                    }
                    result = kind.combine(result, v, element)?;
                }
                Ok(Literal::splat(result, ty))
            }
            OpKind::OuterProduct(op) => self.eval_outer_product(op, ty),
            OpKind::Contract(op) => self.eval_contract(op, ty),
        }
    }

    fn eval_outer_product(&self, op: &OuterProductOp, ty: Type) -> Result<Literal, LoweringError> {
        let element = ty.element_type();
        let lhs = self.get(op.lhs)?;
        let rhs = self.get(op.rhs)?;
        let acc = self.get_opt(op.acc)?;
        let mask = self.get_opt(op.mask)?;
        let mul = BinaryOp::mul(element);

        let mut out = Literal::zeros(ty);
        for i in 0..out.data().len() {
            let index = linear_to_cartesian(i, out.shape());
            let b = if rhs.ty().is_vector() {
                rhs.get(&index[1..])?
            } else {
                rhs.as_scalar()?
            };
            let product = mul.apply(lhs.get(&index[..1])?, b, element);
            let current = acc.map(|a| a.data()[i]);
            let value = match current {
                Some(c) if mask.is_some_and(|m| !m.data()[i].is_true()) => c,
                Some(c) => op.kind.combine(c, product, element)?,
                None => product,
            };
            out.set(&index, value)?;
        }
        Ok(out)
    }

    fn eval_contract(&self, op: &ContractionOp, ty: Type) -> Result<Literal, LoweringError> {
        let element = ty.element_type();
        let lhs = self.get(op.lhs)?;
        let rhs = self.get(op.rhs)?;
        let mask = self.get_opt(op.mask)?;
        let mut out = match self.get_opt(op.acc)? {
            Some(acc) => acc.clone(),
            None => Literal::splat(op.kind.identity(element), ty),
        };

        let domain: Vec<usize> = op
            .domain_extents(self.graph)?
            .into_iter()
            .map(|(extent, _)| extent)
            .collect();
        let total: usize = domain.iter().product();
        let mul = BinaryOp::mul(element);
        for i in 0..total {
            let point = linear_to_cartesian(i, &domain);
            if let Some(mask) = mask {
                if !mask.get(&point)?.is_true() {
                    continue;
                }
            }
            let select = |map: &IndexMap| -> Vec<usize> {
                map.results().iter().map(|&d| point[d]).collect()
            };
            let a = lhs.get(&select(op.lhs_map()))?;
            let b = rhs.get(&select(op.rhs_map()))?;
            let product = mul.apply(a, b, element);
            let res_index = select(op.acc_map());
            let current = out.get(&res_index)?;
            out.set(&res_index, op.kind.combine(current, product, element)?)?;
        }
        Ok(out)
    }
}

/// Evaluate `value` under the given argument bindings.
pub fn evaluate(
    graph: &Graph,
    bindings: &[(&str, Literal)],
    value: ValueId,
) -> Result<Literal, LoweringError> {
    let mut ev = Evaluator::new(graph);
    for (name, literal) in bindings {
        ev.bind(*name, literal.clone());
    }
    ev.eval(value)
}
