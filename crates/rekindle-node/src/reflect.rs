//! Host-facing view of a node tree.
//!
//! [`TreeNode`] is the object-safe surface a host (CLI, editor) uses to walk
//! and edit a parsed tree without knowing the concrete node kinds.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{Error, Field, FieldValue, Result};

/// Uniform, object-safe access to any node.
pub trait TreeNode {
    /// Display name of the node.
    fn name(&self) -> String;

    /// Short kind identifier, e.g. `"entry"`.
    fn kind(&self) -> &'static str;

    /// Every exposed field with its current value.
    fn fields(&self) -> Vec<Field>;

    /// Assign a field by name. Invalidates the node's cached layout.
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// Change the node's name, for kinds that store one.
    fn rename(&mut self, _name: &str) -> Result<()> {
        Err(Error::NotRenamable { kind: self.kind() })
    }

    /// Child nodes in serialization order.
    fn children(&self) -> Vec<&dyn TreeNode>;

    /// Mutable child access. Taking this path invalidates the node, so an
    /// edit anywhere below reaches every ancestor on the way down.
    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode>;

    /// Look up the current value of one field.
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields()
            .into_iter()
            .find(|field| field.name == name)
            .map(|field| field.value)
    }
}

/// Follow a path of child indices from `node`.
pub fn node_at<'n>(node: &'n dyn TreeNode, path: &[usize]) -> Option<&'n dyn TreeNode> {
    match path.split_first() {
        None => Some(node),
        Some((first, rest)) => node
            .children()
            .into_iter()
            .nth(*first)
            .and_then(|child| node_at(child, rest)),
    }
}

/// Follow a path of child indices from `node`, invalidating every node on
/// the way.
pub fn node_at_mut<'n>(node: &'n mut dyn TreeNode, path: &[usize]) -> Option<&'n mut dyn TreeNode> {
    match path.split_first() {
        None => Some(node),
        Some((first, rest)) => node
            .children_mut()
            .into_iter()
            .nth(*first)
            .and_then(|child| node_at_mut(child, rest)),
    }
}

/// Reject a name for a field the node does not have.
pub fn unknown_field(kind: &'static str, field: &str) -> Error {
    Error::UnknownField {
        kind,
        field: field.to_string(),
    }
}

/// An owned capture of a subtree: names, kinds, fields, and child order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Snapshot {
    pub name: String,
    pub kind: &'static str,
    pub fields: Vec<Field>,
    pub children: Vec<Snapshot>,
}

impl Snapshot {
    pub fn capture(node: &dyn TreeNode) -> Self {
        Self {
            name: node.name(),
            kind: node.kind(),
            fields: node.fields(),
            children: node.children().into_iter().map(Snapshot::capture).collect(),
        }
    }

    /// Total number of nodes in the captured subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Snapshot::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf {
        name: String,
        value: u16,
    }

    struct Branch {
        leaves: Vec<Leaf>,
        touched: bool,
    }

    impl TreeNode for Leaf {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn kind(&self) -> &'static str {
            "leaf"
        }

        fn fields(&self) -> Vec<Field> {
            vec![Field::at("value", 0, self.value)]
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
            match name {
                "value" => self.value = value.try_into()?,
                _ => return Err(unknown_field(self.kind(), name)),
            }
            Ok(())
        }

        fn children(&self) -> Vec<&dyn TreeNode> {
            Vec::new()
        }

        fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
            Vec::new()
        }
    }

    impl TreeNode for Branch {
        fn name(&self) -> String {
            "branch".into()
        }

        fn kind(&self) -> &'static str {
            "branch"
        }

        fn fields(&self) -> Vec<Field> {
            Vec::new()
        }

        fn set_field(&mut self, name: &str, _value: FieldValue) -> Result<()> {
            Err(unknown_field(self.kind(), name))
        }

        fn children(&self) -> Vec<&dyn TreeNode> {
            self.leaves.iter().map(|l| l as &dyn TreeNode).collect()
        }

        fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
            self.touched = true;
            self.leaves.iter_mut().map(|l| l as &mut dyn TreeNode).collect()
        }
    }

    fn sample() -> Branch {
        Branch {
            leaves: vec![
                Leaf {
                    name: "a".into(),
                    value: 1,
                },
                Leaf {
                    name: "b".into(),
                    value: 2,
                },
            ],
            touched: false,
        }
    }

    #[test]
    fn test_node_at_path() {
        let tree = sample();
        assert_eq!(node_at(&tree, &[1]).unwrap().name(), "b");
        assert!(node_at(&tree, &[2]).is_none());
        assert!(node_at(&tree, &[0, 0]).is_none());
    }

    #[test]
    fn test_node_at_mut_edits_and_invalidates() {
        let mut tree = sample();
        let leaf = node_at_mut(&mut tree, &[0]).unwrap();
        leaf.set_field("value", FieldValue::U16(9)).unwrap();
        assert!(tree.touched);
        assert_eq!(tree.leaves[0].value, 9);
    }

    #[test]
    fn test_set_field_errors() {
        let mut leaf = Leaf {
            name: "a".into(),
            value: 0,
        };
        assert!(matches!(
            leaf.set_field("missing", FieldValue::U16(1)),
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            leaf.set_field("value", FieldValue::F32(1.0)),
            Err(Error::FieldType { .. })
        ));
        assert!(matches!(leaf.rename("x"), Err(Error::NotRenamable { .. })));
    }

    #[test]
    fn test_snapshot_capture() {
        let snapshot = Snapshot::capture(&sample());
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.children[1].fields[0].value, FieldValue::U16(2));
    }
}
