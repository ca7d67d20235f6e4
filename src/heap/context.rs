//! Execution contexts and request scopes

use super::cell::CellId;
use super::Heap;
use core::ops::{Deref, DerefMut};

/// Execution context: the global it was created for plus the global of the
/// scope chain currently running on it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    global: Option<CellId>,
    scope_global: Option<CellId>,
}

impl ExecutionContext {
    pub fn new(global: Option<CellId>) -> Self {
        Self {
            global,
            scope_global: global,
        }
    }

    #[inline]
    pub fn global(&self) -> Option<CellId> {
        self.global
    }

    /// Global of the innermost running scope; only meaningful inside a request
    #[inline]
    pub fn scope_global(&self) -> Option<CellId> {
        self.scope_global
    }

    pub fn set_global(&mut self, global: Option<CellId>) {
        self.global = global;
    }

    /// Record the global of a scope entered on this context
    pub fn enter_scope(&mut self, scope_global: CellId) {
        self.scope_global = Some(scope_global);
    }

    pub fn leave_scope(&mut self) {
        self.scope_global = self.global;
    }
}

/// RAII request scope
///
/// Entering a request unmarks the context's globals so script about to run
/// never observes a gray global. The request ends when the guard drops.
///
/// Usage:
/// ```ignore
/// let mut request = AutoRequest::new(&mut heap, &cx);
/// request.add_edge(global, obj); // heap access through the guard
/// ```
pub struct AutoRequest<'h> {
    heap: &'h mut Heap,
}

impl<'h> AutoRequest<'h> {
    pub fn new(heap: &'h mut Heap, cx: &ExecutionContext) -> Self {
        heap.begin_request();
        crate::gray::unmark_gray_context(heap, Some(cx));
        Self { heap }
    }
}

impl Deref for AutoRequest<'_> {
    type Target = Heap;

    fn deref(&self) -> &Heap {
        self.heap
    }
}

impl DerefMut for AutoRequest<'_> {
    fn deref_mut(&mut self) -> &mut Heap {
        self.heap
    }
}

impl Drop for AutoRequest<'_> {
    fn drop(&mut self) {
        self.heap.end_request();
    }
}
