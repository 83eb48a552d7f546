//! Arena-indexed value graph.
//!
//! Operations are appended to an arena and never move, so a [`ValueId`] stays
//! valid for the life of the graph. Erasing an operation leaves a tombstone.
//! Operands always refer to operations created earlier, except after
//! [`Graph::replace_all_uses_with`], so arena order is not a topological
//! order in general; use [`Graph::topological_order`] when one is needed.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use smallvec::SmallVec;

use super::op::{OpId, OpKind, Operation, ValueId};
use crate::error::LoweringError;
use crate::types::Type;

/// Marker returned by [`Graph::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Mutable computation graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    ops: Vec<Operation>,
    /// Readers of each value, one entry per operand slot. Entries of erased
    /// readers are skipped on lookup.
    uses: Vec<SmallVec<[OpId; 4]>>,
    outputs: Vec<ValueId>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation whose type has already been checked.
    pub(crate) fn push(&mut self, kind: OpKind, ty: Type) -> ValueId {
        let id = ValueId(self.ops.len());
        for operand in kind.operands() {
            self.uses[operand.0].push(id.defining_op());
        }
        self.uses.push(SmallVec::new());
        self.ops.push(Operation {
            kind,
            ty,
            erased: false,
        });
        id
    }

    /// Get operation by id.
    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0]
    }

    /// Look up the operation defining `value`, failing on erased ones.
    pub fn defining_op(&self, value: ValueId) -> Result<&Operation, LoweringError> {
        match self.ops.get(value.0) {
            Some(op) if !op.erased => Ok(op),
            _ => Err(LoweringError::ErasedValue { index: value.0 }),
        }
    }

    /// Type of `value`.
    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.ops[value.0].ty
    }

    /// Number of operations ever created, erased ones included.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Ids of all operations that are not erased, in arena order.
    pub fn live_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| !op.erased)
            .map(|(i, _)| OpId(i))
    }

    /// Number of live operations satisfying `pred`.
    pub fn count_ops(&self, pred: impl Fn(&OpKind) -> bool) -> usize {
        self.live_ops().filter(|&id| pred(&self.op(id).kind)).count()
    }

    /// Live operations reading `value`, in the order they started to.
    pub fn users(&self, value: ValueId) -> Vec<OpId> {
        let mut users: Vec<OpId> = Vec::new();
        for &id in &self.uses[value.0] {
            if !self.ops[id.0].erased && !users.contains(&id) {
                users.push(id);
            }
        }
        users
    }

    /// Register `value` as a function result.
    pub fn add_output(&mut self, value: ValueId) {
        self.outputs.push(value);
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn output(&self, index: usize) -> ValueId {
        self.outputs[index]
    }

    /// Redirect every use of `from`, results included, to `to`.
    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) {
        if from == to {
            return;
        }
        for user in std::mem::take(&mut self.uses[from.0]) {
            let op = &mut self.ops[user.0];
            if op.erased {
                continue;
            }
            op.kind.for_each_operand_mut(|v| {
                if *v == from {
                    *v = to;
                }
            });
            self.uses[to.0].push(user);
        }
        for v in &mut self.outputs {
            if *v == from {
                *v = to;
            }
        }
    }

    /// Erase an operation that no longer has users.
    pub fn erase(&mut self, id: OpId) -> Result<(), LoweringError> {
        let value = id.result();
        if !self.users(value).is_empty() || self.outputs.contains(&value) {
            return Err(LoweringError::invalid(
                "erase",
                format!("{value} still has uses"),
            ));
        }
        self.ops[id.0].erased = true;
        Ok(())
    }

    /// Remember the current end of the arena.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.ops.len())
    }

    /// Drop every operation created after `checkpoint`.
    ///
    /// Only valid while nothing older than the checkpoint refers to the
    /// dropped operations, i.e. before any use replacement.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let end = checkpoint.0;
        for op in self.ops.drain(end..) {
            for operand in op.kind.operands() {
                if operand.0 < end {
                    self.uses[operand.0].retain(|user| user.0 < end);
                }
            }
        }
        self.uses.truncate(end);
    }

    /// Operations created since `checkpoint`.
    pub fn ops_since(&self, checkpoint: Checkpoint) -> impl Iterator<Item = OpId> + '_ {
        (checkpoint.0..self.ops.len())
            .map(OpId)
            .filter(|&id| !self.op(id).erased)
    }

    /// Operations that `roots` depend on, dependencies first.
    pub fn topological_order(&self, roots: &[ValueId]) -> Result<Vec<OpId>, LoweringError> {
        let mut dag: DiGraph<OpId, ()> = DiGraph::new();
        let mut nodes: HashMap<OpId, NodeIndex> = HashMap::new();
        let mut stack: Vec<ValueId> = roots.to_vec();

        while let Some(value) = stack.pop() {
            let id = value.defining_op();
            if nodes.contains_key(&id) {
                continue;
            }
            let op = self.defining_op(value)?;
            nodes.insert(id, dag.add_node(id));
            stack.extend(op.kind.operands());
        }

        for (&id, &node) in &nodes {
            for operand in self.op(id).kind.operands() {
                dag.add_edge(nodes[&operand.defining_op()], node, ());
            }
        }

        let order = toposort(&dag, None).map_err(|_| LoweringError::CyclicGraph)?;
        Ok(order.into_iter().map(|n| dag[n]).collect())
    }

    /// Live operations in dependency order, dead ones included.
    fn print_order(&self) -> Vec<OpId> {
        let roots: Vec<ValueId> = self.live_ops().map(|id| id.result()).collect();
        self.topological_order(&roots)
            .unwrap_or_else(|_| self.live_ops().collect())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut order = self.print_order();
        // toposort gives no stable tie-break; keep arena order among ready ops
        // by sorting on a (depth, index) key.
        let mut depth: HashMap<OpId, usize> = HashMap::new();
        for &id in &order {
            let d = self
                .op(id)
                .kind
                .operands()
                .iter()
                .map(|v| depth.get(&v.defining_op()).map_or(0, |d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(id, d);
        }
        order.sort_by_key(|id| (depth[id], id.0));

        for id in order {
            let op = self.op(id);
            write!(f, "{} = ", id.result())?;
            super::print::write_op(f, &op.kind)?;
            writeln!(f, " : {}", op.ty)?;
        }
        if !self.outputs.is_empty() {
            f.write_str("return")?;
            for (i, v) in self.outputs.iter().enumerate() {
                write!(f, "{}{v}", if i == 0 { " " } else { ", " })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::BinaryOp;
    use crate::types::ElementType;

    fn vec4() -> Type {
        Type::vector(&[4], ElementType::F32)
    }

    #[test]
    fn test_push_and_lookup() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        assert_eq!(a.index(), 0);
        assert_eq!(g.value_type(a), &vec4());
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_replace_and_erase() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let b = g.argument("b", vec4());
        let t = g.transpose(a, &[0]).unwrap();
        g.add_output(t);

        g.replace_all_uses_with(t, b);
        assert_eq!(g.output(0), b);
        g.erase(t.defining_op()).unwrap();
        assert!(g.op(t.defining_op()).is_erased());
        assert!(g.defining_op(t).is_err());
    }

    #[test]
    fn test_erase_with_uses_fails() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let _ = g.transpose(a, &[0]).unwrap();
        assert!(g.erase(a.defining_op()).is_err());
    }

    #[test]
    fn test_checkpoint_rollback() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let cp = g.checkpoint();
        let _ = g.transpose(a, &[0]).unwrap();
        let _ = g.zero(vec4());
        assert_eq!(g.ops_since(cp).count(), 2);
        g.rollback(cp);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_users_follow_replacement_and_rollback() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let b = g.argument("b", vec4());
        let t = g.transpose(a, &[0]).unwrap();
        let s = g.binary(BinaryOp::AddF, t, t).unwrap();
        assert_eq!(g.users(t), vec![s.defining_op()]);

        let cp = g.checkpoint();
        let _ = g.transpose(b, &[0]).unwrap();
        let _ = g.extract(t, &[1]).unwrap();
        assert_eq!(g.users(t).len(), 2);
        g.rollback(cp);
        assert_eq!(g.users(t), vec![s.defining_op()]);
        assert!(g.users(b).is_empty());

        g.replace_all_uses_with(t, b);
        assert!(g.users(t).is_empty());
        assert_eq!(g.users(b), vec![s.defining_op()]);
        assert_eq!(g.op(s.defining_op()).kind().operands().as_slice(), &[b, b]);
        g.erase(t.defining_op()).unwrap();

        g.erase(s.defining_op()).unwrap();
        assert!(g.users(b).is_empty());
    }

    #[test]
    fn test_topological_order_after_replacement() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let placeholder = g.zero(vec4());
        let user = g.extract(placeholder, &[1]).unwrap();
        // Defined after its future user.
        let late = g.transpose(a, &[0]).unwrap();
        g.replace_all_uses_with(placeholder, late);

        let order = g.topological_order(&[user]).unwrap();
        let pos = |v: ValueId| order.iter().position(|&id| id == v.defining_op()).unwrap();
        assert!(pos(a) < pos(late));
        assert!(pos(late) < pos(user));
        assert!(!order.contains(&placeholder.defining_op()));
    }

    #[test]
    fn test_display() {
        let mut g = Graph::new();
        let a = g.argument("a", vec4());
        let e = g.extract(a, &[2]).unwrap();
        g.add_output(e);
        let text = g.to_string();
        assert!(text.contains("%0 = argument \"a\" : vector<4xf32>"));
        assert!(text.contains("%1 = extract %0[2] : f32"));
        assert!(text.contains("return %1"));
    }
}
