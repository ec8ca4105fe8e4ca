//! Serialized function bodies.
//!
//! Generic declarations imported from another unit are not resident in the IR; their bodies
//! travel as a `BodySummary` and are materialized on first use. Node ids inside a summary are
//! relative to the summary; type and definition ids refer to the unit's shared tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stencil_type::definition::DefinitionId;

use crate::{IR, Node, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBody {
  pub func: DefinitionId,
  pub root: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySummary {
  pub func: DefinitionId,
  pub root: NodeId,
  pub nodes: Vec<Node>,
  /// Bodies of closures created inside the function.
  pub closures: Vec<SummaryBody>,
}

impl BodySummary {
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }

  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  /// Checks that every node id in the summary points inside it.
  pub fn validate(&self) -> Result<(), String> {
    let len = self.nodes.len();
    let check = |what: &str, id: NodeId| {
      if (id.index() as usize) < len {
        Ok(())
      } else {
        Err(format!("{} refers to node {} of {}", what, id.index(), len))
      }
    };

    check("root", self.root)?;
    for closure in &self.closures {
      check("closure root", closure.root)?;
    }
    for (i, node) in self.nodes.iter().enumerate() {
      for child in node.kind.children() {
        check(&format!("node {}", i), child)?;
      }
    }

    Ok(())
  }
}

impl IR {
  /// Packs the body of `func` (and of every closure nested in it) into a summary.
  /// Returns `None` if `func` has no body.
  pub fn export_body(
    &self,
    func: &DefinitionId,
  ) -> Option<BodySummary> {
    let root = self.body(func)?;

    let mut order: Vec<NodeId> = Vec::new();
    let mut closures: Vec<(DefinitionId, NodeId)> = Vec::new();
    let mut pending = vec![(*func, root)];

    while let Some((owner, body_root)) = pending.pop() {
      if owner != *func {
        closures.push((owner, body_root));
      }
      for id in self.preorder(body_root) {
        if let NodeKind::Closure { func: inner, .. } = &self.get(&id).kind {
          if let Some(inner_root) = self.body(inner) {
            pending.push((*inner, inner_root));
          }
        }
        order.push(id);
      }
    }

    let relative: HashMap<NodeId, NodeId> = order
      .iter()
      .enumerate()
      .map(|(i, id)| (*id, NodeId::new(i as u32)))
      .collect();
    let mut remap = |id: NodeId| relative[&id];

    let nodes = order
      .iter()
      .map(|id| {
        let mut node = self.get(id).clone();
        node.kind.remap_ids(&mut remap);
        node
      })
      .collect();

    Some(BodySummary {
      func: *func,
      root: relative[&root],
      nodes,
      closures: closures
        .into_iter()
        .map(|(func, root)| SummaryBody {
          func,
          root: relative[&root],
        })
        .collect(),
    })
  }

  /// Appends the summary's nodes and registers the bodies it carries. Returns the new root.
  /// A summary with dangling node ids is rejected before anything is appended.
  pub fn import_body(
    &mut self,
    summary: BodySummary,
  ) -> Result<NodeId, String> {
    summary.validate()?;
    let base = self.nodes.next_id().index();

    for mut node in summary.nodes {
      node.kind.offset_ids(base);
      self.alloc(node);
    }

    for closure in summary.closures {
      self.bodies.insert(closure.func, NodeId::new(closure.root.index() + base));
    }

    let root = NodeId::new(summary.root.index() + base);
    self.bodies.insert(summary.func, root);
    Ok(root)
  }
}
