//! Object graph walker
//!
//! Visits every persistent object reachable from a set of roots through
//! in-memory members, each exactly once. Cycles (including an object that
//! holds itself) are cut by a visited set keyed on object identity, never on
//! value equality. The walk is iterative so deep chains cannot overflow the
//! stack.

use crate::object::{identity, ObjectRef};
use mvstm_core::StmResult;
use rustc_hash::FxHashSet;

/// What the walker does after visiting an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Visit the object's members
    Descend,
    /// Do not look at the object's members
    Skip,
}

/// Walk the graph reachable from `roots`
///
/// `visit` is called once per distinct object; an error stops the walk and is
/// returned. Returns the number of objects visited.
pub fn walk<I, F>(roots: I, mut visit: F) -> StmResult<usize>
where
    I: IntoIterator<Item = ObjectRef>,
    F: FnMut(&ObjectRef) -> StmResult<Walk>,
{
    let mut visited = FxHashSet::default();
    let mut pending: Vec<ObjectRef> = roots.into_iter().collect();
    pending.reverse();

    while let Some(object) = pending.pop() {
        if !visited.insert(identity(&object)) {
            continue;
        }
        if visit(&object)? == Walk::Descend {
            let mut members = object.members();
            members.reverse();
            pending.extend(members);
        }
    }
    Ok(visited.len())
}

/// Every object reachable from `root`, root first, in depth-first order
pub fn reachable(root: ObjectRef) -> Vec<ObjectRef> {
    let mut found = Vec::new();
    // The visitor never fails.
    let _ = walk([root], |object| {
        found.push(object.clone());
        Ok(Walk::Descend)
    });
    found
}
