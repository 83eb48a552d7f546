//! Textual form of operations.

use std::fmt;

use super::op::{ConstantValue, OpKind, ValueId};

fn write_position(f: &mut fmt::Formatter<'_>, position: &[usize]) -> fmt::Result {
    f.write_str("[")?;
    for (i, p) in position.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{p}")?;
    }
    f.write_str("]")
}

fn write_optional(f: &mut fmt::Formatter<'_>, label: &str, value: Option<ValueId>) -> fmt::Result {
    match value {
        Some(v) => write!(f, " {label}({v})"),
        None => Ok(()),
    }
}

pub(super) fn write_op(f: &mut fmt::Formatter<'_>, kind: &OpKind) -> fmt::Result {
    let name = kind.mnemonic();
    match kind {
        OpKind::Argument { name: arg } => write!(f, "{name} {arg:?}"),
        OpKind::Constant(ConstantValue::Splat(s)) => write!(f, "{name} splat({s})"),
        OpKind::Constant(ConstantValue::Dense(data)) => {
            write!(f, "{name} dense<")?;
            for (i, s) in data.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{s}")?;
            }
            f.write_str(">")
        }
        OpKind::Extract { source, position } => {
            write!(f, "{name} {source}")?;
            write_position(f, position)
        }
        OpKind::Insert {
            value,
            dest,
            position,
        } => {
            write!(f, "{name} {value}, {dest}")?;
            write_position(f, position)
        }
        OpKind::Broadcast { source } | OpKind::Extend { source } => {
            write!(f, "{name} {source}")
        }
        OpKind::Transpose {
            source,
            permutation,
        } => {
            write!(f, "{name} {source}, ")?;
            write_position(f, permutation)
        }
        OpKind::Binary { lhs, rhs, .. } => write!(f, "{name} {lhs}, {rhs}"),
        OpKind::Fma { lhs, rhs, acc } => write!(f, "{name} {lhs}, {rhs}, {acc}"),
        OpKind::Select {
            condition,
            true_value,
            false_value,
        } => write!(f, "{name} {condition}, {true_value}, {false_value}"),
        OpKind::Reduction {
            kind,
            vector,
            acc,
            mask,
        } => {
            write!(f, "{name} <{kind}> {vector}")?;
            write_optional(f, "acc", *acc)?;
            write_optional(f, "mask", *mask)
        }
        OpKind::OuterProduct(op) => {
            write!(f, "{name} <{}> {}, {}", op.kind, op.lhs, op.rhs)?;
            write_optional(f, "acc", op.acc)?;
            write_optional(f, "mask", op.mask)
        }
        OpKind::Contract(op) => {
            write!(f, "{name} <{}> {}, {}", op.kind, op.lhs, op.rhs)?;
            write_optional(f, "acc", op.acc)?;
            write_optional(f, "mask", op.mask)?;
            f.write_str(" {maps = [")?;
            for (i, map) in op.indexing_maps.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{map}")?;
            }
            f.write_str("], iterators = [")?;
            for (i, it) in op.iterator_types.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{it}")?;
            }
            f.write_str("]}")
        }
    }
}
