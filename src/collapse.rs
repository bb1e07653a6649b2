//! Association presence collapsing: given a nested create payload, record
//! exactly which declared relationships carry data, as a tree keyed by
//! relationship path. The tree then drives which relationships the create
//! eagerly attaches; relationships the caller never populated are never
//! touched.

use crate::model::{ModelRegistry, RelationshipDescriptor, RelationshipKind};
use crate::store::{AttachNode, AttachSpec};
use serde_json::Value;
use std::collections::BTreeMap;

/// Set-shaped tree of relationship paths that hold attached data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceTree {
    children: BTreeMap<String, PresenceTree>,
}

impl PresenceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &PresenceTree)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_path(&self, path: &[&str]) -> bool {
        match path.split_first() {
            None => true,
            Some((head, rest)) => self
                .children
                .get(*head)
                .map(|child| child.contains_path(rest))
                .unwrap_or(false),
        }
    }

    /// Insert a path, creating intermediate nodes. Idempotent.
    fn ensure(&mut self, path: &[String]) -> &mut PresenceTree {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }
}

/// Walk `payload` against the declared relationship map, recording in `tree`
/// (under `path`) every relationship path that holds a value.
///
/// A missing payload contributes nothing. A scalar payload is treated as a
/// one-element sequence, so single-record and bulk inputs behave identically.
/// Payload keys that do not name a declared relationship are silently
/// ignored; rejecting them is the type system's job, not ours.
pub fn condense_associations(
    tree: &mut PresenceTree,
    path: &[String],
    relationships: &BTreeMap<String, RelationshipDescriptor>,
    registry: &ModelRegistry,
    payload: Option<&Value>,
) {
    let Some(payload) = payload else { return };
    if payload.is_null() {
        return;
    }
    let elements: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    for (akey, rel) in relationships {
        let mut sub_path = path.to_vec();
        sub_path.push(akey.clone());
        for element in &elements {
            let Some(attached) = element.get(akey) else { continue };
            if attached.is_null() {
                continue;
            }
            tree.ensure(&sub_path);
            if let Some(target) = registry.get(&rel.target) {
                condense_associations(
                    tree,
                    &sub_path,
                    &target.relationships,
                    registry,
                    Some(attached),
                );
            }
        }
    }
}

/// Translate a presence tree into the eager-attach instruction set handed to
/// the storage collaborator: one node per declared relationship that the
/// payload actually populated, nested to any depth.
pub fn attach_spec_from_tree(
    tree: &PresenceTree,
    relationships: &BTreeMap<String, RelationshipDescriptor>,
    registry: &ModelRegistry,
) -> AttachSpec {
    AttachSpec {
        include: attach_nodes(tree, relationships, registry),
    }
}

fn attach_nodes(
    tree: &PresenceTree,
    relationships: &BTreeMap<String, RelationshipDescriptor>,
    registry: &ModelRegistry,
) -> Vec<AttachNode> {
    let mut nodes = Vec::new();
    for (akey, rel) in relationships {
        let Some(subtree) = tree.children.get(akey) else { continue };
        let children = match registry.get(&rel.target) {
            Some(target) => attach_nodes(subtree, &target.relationships, registry),
            None => Vec::new(),
        };
        nodes.push(AttachNode {
            relationship: akey.clone(),
            target: rel.target.clone(),
            through: match &rel.kind {
                RelationshipKind::ToManyThrough { join_entity } => Some(join_entity.clone()),
                _ => None,
            },
            foreign_key: rel.foreign_key.clone(),
            include: children,
        });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, AttributeKind, EntityDescriptor};
    use serde_json::json;

    fn pk() -> AttributeDescriptor {
        AttributeDescriptor {
            name: "id".into(),
            kind: AttributeKind::Int,
            nullable: false,
            primary_key: true,
            references: None,
            auto_managed: false,
        }
    }

    fn rel(kind: RelationshipKind, target: &str, fk: &str) -> RelationshipDescriptor {
        RelationshipDescriptor { kind, target: target.into(), foreign_key: fk.into() }
    }

    /// User -> todos -> {todonotes, likedBy}, todonotes -> likedBy.
    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        let mut user_rels = BTreeMap::new();
        user_rels.insert("todos".into(), rel(RelationshipKind::ToMany, "Todo", "userId"));
        reg.register(EntityDescriptor {
            name: "User".into(),
            attributes: vec![pk()],
            relationships: user_rels,
        })
        .unwrap();

        let mut todo_rels = BTreeMap::new();
        todo_rels.insert("todonotes".into(), rel(RelationshipKind::ToMany, "TodoNote", "todoId"));
        todo_rels.insert("likedBy".into(), rel(RelationshipKind::ToMany, "User", "todoId"));
        reg.register(EntityDescriptor {
            name: "Todo".into(),
            attributes: vec![pk()],
            relationships: todo_rels,
        })
        .unwrap();

        let mut note_rels = BTreeMap::new();
        note_rels.insert("likedBy".into(), rel(RelationshipKind::ToMany, "User", "noteId"));
        reg.register(EntityDescriptor {
            name: "TodoNote".into(),
            attributes: vec![pk()],
            relationships: note_rels,
        })
        .unwrap();
        reg
    }

    fn collapse(payload: &Value) -> PresenceTree {
        let reg = registry();
        let user = reg.get("User").unwrap().clone();
        let mut tree = PresenceTree::new();
        condense_associations(&mut tree, &[], &user.relationships, &reg, Some(payload));
        tree
    }

    #[test]
    fn nested_associations_condense() {
        let payload = json!({
            "email": "yup",
            "password": "ygg",
            "todos": [
                {
                    "text": "hippy",
                    "completed": true,
                    "todonotes": [{ "text": "dippy" }, { "text": "yup" }]
                },
                {
                    "text": "hippy",
                    "completed": true,
                    "likedBy": [{ "username": "chad" }],
                    "todonotes": [
                        { "text": "dippy" },
                        { "text": "yup", "likedBy": [{ "username": "thomas" }] }
                    ]
                }
            ]
        });
        let tree = collapse(&payload);
        assert!(tree.contains_path(&["todos"]));
        assert!(tree.contains_path(&["todos", "likedBy"]));
        assert!(tree.contains_path(&["todos", "todonotes"]));
        assert!(tree.contains_path(&["todos", "todonotes", "likedBy"]));
        // Paths with no attached data never appear.
        assert!(!tree.contains_path(&["todos", "todonotes", "likedBy", "todos"]));
    }

    #[test]
    fn absent_and_empty_payloads_contribute_nothing() {
        let reg = registry();
        let user = reg.get("User").unwrap().clone();
        let mut tree = PresenceTree::new();
        condense_associations(&mut tree, &[], &user.relationships, &reg, None);
        assert!(tree.is_empty());

        let tree = collapse(&json!({ "email": "a@x.com" }));
        assert!(tree.is_empty());

        let tree = collapse(&json!({ "todos": null }));
        assert!(tree.is_empty());
    }

    #[test]
    fn unknown_payload_keys_ignored() {
        let tree = collapse(&json!({ "mystery": [{ "x": 1 }] }));
        assert!(tree.is_empty());
    }

    #[test]
    fn collapsing_twice_is_idempotent() {
        let payload = json!({ "todos": [{ "todonotes": [{ "text": "n" }] }] });
        let reg = registry();
        let user = reg.get("User").unwrap().clone();
        let mut tree = PresenceTree::new();
        condense_associations(&mut tree, &[], &user.relationships, &reg, Some(&payload));
        let first = tree.clone();
        condense_associations(&mut tree, &[], &user.relationships, &reg, Some(&payload));
        assert_eq!(tree, first);
    }

    #[test]
    fn attach_spec_mirrors_presence() {
        let payload = json!({ "todos": [{ "todonotes": [{ "text": "n" }] }] });
        let reg = registry();
        let user = reg.get("User").unwrap().clone();
        let mut tree = PresenceTree::new();
        condense_associations(&mut tree, &[], &user.relationships, &reg, Some(&payload));
        let spec = attach_spec_from_tree(&tree, &user.relationships, &reg);
        assert_eq!(spec.include.len(), 1);
        assert_eq!(spec.include[0].relationship, "todos");
        assert_eq!(spec.include[0].target, "Todo");
        assert_eq!(spec.include[0].include.len(), 1);
        assert_eq!(spec.include[0].include[0].relationship, "todonotes");
    }
}
