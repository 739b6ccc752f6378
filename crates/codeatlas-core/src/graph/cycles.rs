//! Cycle detection over a [`DependencyGraph`].
//!
//! One iterative depth-first walk serves the import, call and workspace
//! graphs. Each root gets its own path and on-stack set, so nothing leaks
//! between traversals. When an edge reaches a node that is on the current
//! path, the cycle is the path suffix from that node plus the node again.

use std::collections::HashSet;

use super::dependency_graph::DependencyGraph;

struct Frame<'g> {
    successors: Vec<&'g str>,
    next: usize,
}

/// Every distinct cycle, in discovery order.
///
/// A cycle, its rotations and its reverse count as one; the first-seen
/// orientation is kept. Roots are tried in node insertion order and a node
/// finished by an earlier root is not walked again.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut cycles = Vec::new();

    for root in graph.nodes() {
        if !visited.insert(root) {
            continue;
        }
        let mut path = vec![root];
        let mut on_stack: HashSet<&str> = HashSet::from([root]);
        let mut frames = vec![Frame {
            successors: graph.successors(root),
            next: 0,
        }];

        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let step = frame.successors.get(frame.next).copied();
            frame.next += 1;

            match step {
                Some(next) if on_stack.contains(next) => {
                    let Some(start) = path.iter().position(|n| *n == next) else {
                        continue;
                    };
                    let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(next.to_string());
                    if seen.insert(canonical(&cycle)) {
                        cycles.push(cycle);
                    }
                }
                Some(next) => {
                    if visited.insert(next) {
                        path.push(next);
                        on_stack.insert(next);
                        frames.push(Frame {
                            successors: graph.successors(next),
                            next: 0,
                        });
                    }
                }
                None => {
                    frames.pop();
                    if let Some(done) = path.pop() {
                        on_stack.remove(done);
                    }
                }
            }
        }
    }

    if !cycles.is_empty() {
        log::debug!("found {} cycle(s) over {} nodes", cycles.len(), graph.node_count());
    }
    cycles
}

/// Orientation- and rotation-independent key of a closed cycle.
fn canonical(cycle: &[String]) -> Vec<String> {
    let open = &cycle[..cycle.len().saturating_sub(1)];
    let forward = rotate_to_min(open.to_vec());
    let mut reversed = open.to_vec();
    reversed.reverse();
    let backward = rotate_to_min(reversed);
    forward.min(backward)
}

fn rotate_to_min(mut nodes: Vec<String>) -> Vec<String> {
    if let Some(pos) = nodes
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        nodes.rotate_left(pos);
    }
    nodes
}
