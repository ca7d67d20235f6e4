//! Recursive gray unmarking over a cyclic graph
//!
//! The walk never recurses on the call stack. A worklist holds the gray
//! things still to process and a bit set indexed by `thing_index` records
//! what has been queued, so every thing is processed at most once and the
//! walk is linear in the number of distinct things reached.

use super::GrayMarking;
use crate::heap::GcThing;
use crate::logging::log_gray_walk;
use bitvec::prelude::*;
use smallvec::SmallVec;

/// Clear gray on `root` and on every gray thing reachable from it
///
/// Stops at anything not gray. Returns the number of things unmarked.
pub fn unmark_gray_recursive<G>(heap: &mut G, root: GcThing) -> usize
where
    G: GrayMarking + ?Sized,
{
    if !heap.is_gray(root) {
        return 0;
    }

    let mut visited: BitVec = bitvec![0; heap.index_bound()];
    let mut worklist: Vec<GcThing> = Vec::with_capacity(heap.worklist_capacity_hint());
    let mut children: SmallVec<[GcThing; 8]> = SmallVec::new();

    first_visit(&mut visited, heap.thing_index(root));
    worklist.push(root);

    let mut processed = 0;
    let mut unmarked = 0;

    while let Some(thing) = worklist.pop() {
        processed += 1;
        if !heap.is_gray(thing) {
            continue;
        }
        heap.unmark_gray_cell(thing);
        unmarked += 1;

        children.clear();
        heap.for_each_child(thing, &mut |child| children.push(child));

        for &child in &children {
            if heap.is_gray(child) && first_visit(&mut visited, heap.thing_index(child)) {
                worklist.push(child);
            }
        }
    }

    log_gray_walk(processed, unmarked);
    unmarked
}

/// Mark `index` visited; false if it already was
#[inline]
fn first_visit(visited: &mut BitVec, index: usize) -> bool {
    if index >= visited.len() {
        visited.resize(index + 1, false);
    }
    if visited[index] {
        return false;
    }
    visited.set(index, true);
    true
}
