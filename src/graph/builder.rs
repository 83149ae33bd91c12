//! Deletion ordering over the foreign-key graph.
//!
//! [`GraphBuilder`] turns an unordered table set and relationship set into a
//! linear deletion order where every child is emptied before the parent it
//! references. Cycles (self-referencing tables, mutual references) are broken
//! by forcing one table out early; the relationships that placement violates
//! are reported in [`GraphBuilder::cyclic_relationships`] so an adapter can
//! disable those constraints around the delete.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{Relationship, Table};

/// A table plus the live relationships it participates in.
///
/// Both sets hold indices into the builder's relationship list and shrink as
/// tables are placed.
#[derive(Debug, Default)]
struct Node {
    /// Relationships where this table is the parent (children still reference it).
    incoming: BTreeSet<usize>,
    /// Relationships where this table is the child (it references a parent).
    outgoing: BTreeSet<usize>,
}

/// A computed deletion plan.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    to_delete: Vec<Table>,
    cyclic_relationships: BTreeSet<Relationship>,
}

impl GraphBuilder {
    /// Order `tables` for deletion given `relationships`.
    ///
    /// Total over any input: relationships naming a table outside `tables`
    /// are ignored, and cycles are broken deterministically.
    pub fn new(tables: &BTreeSet<Table>, relationships: &BTreeSet<Relationship>) -> Self {
        let tables: Vec<&Table> = tables.iter().collect();
        let index: BTreeMap<&Table, usize> =
            tables.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        // (parent, child, relationship)
        let edges: Vec<(usize, usize, &Relationship)> = relationships
            .iter()
            .filter_map(|rel| {
                let parent = *index.get(&rel.parent)?;
                let child = *index.get(&rel.child)?;
                Some((parent, child, rel))
            })
            .collect();

        let mut nodes: Vec<Node> = tables.iter().map(|_| Node::default()).collect();
        for (i, (parent, child, _)) in edges.iter().enumerate() {
            nodes[*parent].incoming.insert(i);
            nodes[*child].outgoing.insert(i);
        }

        let mut remaining: BTreeSet<usize> = (0..tables.len()).collect();
        let mut to_delete = Vec::with_capacity(tables.len());
        let mut cyclic_relationships = BTreeSet::new();

        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| nodes[i].incoming.is_empty())
                .collect();

            if !ready.is_empty() {
                for i in ready {
                    place(i, &mut nodes, &edges, &mut remaining);
                    to_delete.push(tables[i].clone());
                }
                continue;
            }

            // Every remaining table is still referenced: force one out.
            let Some(forced) = cycle_breaker(&nodes, &edges, &remaining) else {
                break;
            };

            for &e in &nodes[forced].incoming {
                cyclic_relationships.insert(edges[e].2.clone());
            }
            tracing::debug!(
                table = %tables[forced],
                broken = nodes[forced].incoming.len(),
                "breaking foreign key cycle"
            );

            place(forced, &mut nodes, &edges, &mut remaining);
            to_delete.push(tables[forced].clone());
        }

        Self {
            to_delete,
            cyclic_relationships,
        }
    }

    /// Tables in the order they must be emptied.
    pub fn to_delete(&self) -> &[Table] {
        &self.to_delete
    }

    /// Relationships the deletion order violates because they sit on a cycle.
    pub fn cyclic_relationships(&self) -> &BTreeSet<Relationship> {
        &self.cyclic_relationships
    }

    /// Whether any constraint must be relaxed to run the deletes.
    pub fn has_cycles(&self) -> bool {
        !self.cyclic_relationships.is_empty()
    }
}

/// Remove table `i` from the graph, retiring every relationship it is part of.
fn place(
    i: usize,
    nodes: &mut [Node],
    edges: &[(usize, usize, &Relationship)],
    remaining: &mut BTreeSet<usize>,
) {
    remaining.remove(&i);

    let incoming = std::mem::take(&mut nodes[i].incoming);
    let outgoing = std::mem::take(&mut nodes[i].outgoing);

    for e in incoming {
        let (_, child, _) = edges[e];
        nodes[child].outgoing.remove(&e);
    }
    for e in outgoing {
        let (parent, _, _) = edges[e];
        nodes[parent].incoming.remove(&e);
    }
}

/// Pick the table to force out when no table is free.
///
/// Only tables on a live cycle are candidates, so a table that is merely
/// waiting on a cycle downstream is never forced. Among those, the one with
/// the fewest live references wins, ties going to table order.
fn cycle_breaker(
    nodes: &[Node],
    edges: &[(usize, usize, &Relationship)],
    remaining: &BTreeSet<usize>,
) -> Option<usize> {
    cyclic_tables(nodes, edges, remaining)
        .into_iter()
        .min_by_key(|&i| (nodes[i].incoming.len(), i))
        .or_else(|| remaining.first().copied())
}

/// Tables on a live cycle: members of a strongly connected component with
/// more than one table, or tables that reference themselves.
///
/// Kosaraju over the live edges, one pass in each direction.
fn cyclic_tables(
    nodes: &[Node],
    edges: &[(usize, usize, &Relationship)],
    remaining: &BTreeSet<usize>,
) -> BTreeSet<usize> {
    let children = |i: usize| -> Vec<usize> {
        nodes[i].incoming.iter().map(|&e| edges[e].1).collect()
    };
    let parents = |i: usize| -> Vec<usize> {
        nodes[i].outgoing.iter().map(|&e| edges[e].0).collect()
    };

    // Finish order walking parent -> child.
    let mut visited = vec![false; nodes.len()];
    let mut finished = Vec::with_capacity(remaining.len());
    for &root in remaining {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack = vec![(root, children(root))];

        while let Some(top) = stack.len().checked_sub(1) {
            match stack[top].1.pop() {
                Some(next) if !visited[next] => {
                    visited[next] = true;
                    stack.push((next, children(next)));
                }
                Some(_) => {}
                None => {
                    finished.push(stack[top].0);
                    stack.pop();
                }
            }
        }
    }

    // Components walking child -> parent, in reverse finish order.
    let mut component = vec![usize::MAX; nodes.len()];
    let mut sizes = Vec::new();
    for &root in finished.iter().rev() {
        if component[root] != usize::MAX {
            continue;
        }
        let id = sizes.len();
        let mut size = 0usize;
        component[root] = id;
        let mut stack = vec![root];

        while let Some(i) = stack.pop() {
            size += 1;
            for parent in parents(i) {
                if component[parent] == usize::MAX {
                    component[parent] = id;
                    stack.push(parent);
                }
            }
        }
        sizes.push(size);
    }

    remaining
        .iter()
        .copied()
        .filter(|&i| {
            sizes[component[i]] > 1 || nodes[i].incoming.iter().any(|&e| edges[e].1 == i)
        })
        .collect()
}
