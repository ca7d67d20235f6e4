//! Managed heap - reference model of the script engine's heap
//!
//! The bridge treats the engine as an external collaborator. This module
//! provides the parts of it the bridge consumes:
//! 1. Cell allocation per isolation domain, reserved and private slots
//! 2. Tri-color state and the incremental reference barrier
//! 3. Child tracing for the gray walk
//! 4. A mark/sweep simulation so collector-driven scenarios can be replayed
//!
//! Cells live in a versioned slab. A `CellId` whose cell was reclaimed reads
//! as empty, which is how weak wrapper references observe reclamation.

mod barrier;
mod cell;
mod context;


pub use barrier::{GcPhase, IncrementalState};
pub use cell::{
    Cell, CellId, Color, DomainId, GcThing, ObjectClass, Private, SlotValue, TraceKind,
    GLOBAL_ENGINE_SLOTS,
};
pub use context::{AutoRequest, ExecutionContext};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::gray::GrayMarking;
use crate::logging::{log_barrier, log_sweep, trace};

struct Entry {
    version: u32,
    cell: Option<Cell>,
}

/// Heap statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_cells: usize,
    pub reclaimed_cells: usize,
    pub cells_unmarked: usize,
    pub barriers_fired: usize,
}

pub struct Heap {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
    domains: Vec<String>,
    incremental: IncrementalState,
    request_depth: u32,
    reclaimed: usize,
    unmarked: usize,
    config: BridgeConfig,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            entries: Vec::with_capacity(config.heap.initial_capacity),
            free: Vec::new(),
            live: 0,
            domains: Vec::new(),
            incremental: IncrementalState::default(),
            request_depth: 0,
            reclaimed: 0,
            unmarked: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ===== Domains =====

    pub fn create_domain(&mut self, name: impl Into<String>) -> DomainId {
        self.domains.push(name.into());
        DomainId(self.domains.len() as u32 - 1)
    }

    #[inline]
    pub fn has_domain(&self, domain: DomainId) -> bool {
        (domain.0 as usize) < self.domains.len()
    }

    pub fn domain_name(&self, domain: DomainId) -> Option<&str> {
        self.domains.get(domain.0 as usize).map(String::as_str)
    }

    // ===== Allocation =====

    /// Fail unless `count` more cells fit under the configured limit
    pub fn ensure_capacity(&self, count: usize) -> Result<(), BridgeError> {
        match self.config.heap.max_cells {
            Some(limit) if self.live + count > limit => Err(BridgeError::AllocationFailed {
                requested: count,
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn try_allocate(
        &mut self,
        class: ObjectClass,
        domain: DomainId,
    ) -> Result<CellId, BridgeError> {
        if !self.has_domain(domain) {
            return Err(BridgeError::UnknownDomain(domain));
        }
        self.ensure_capacity(1)?;

        let cell = Cell::new(class, domain);
        self.live += 1;

        let id = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.cell = Some(cell);
                CellId {
                    index,
                    version: entry.version,
                }
            }
            None => {
                self.entries.push(Entry {
                    version: 0,
                    cell: Some(cell),
                });
                CellId {
                    index: self.entries.len() as u32 - 1,
                    version: 0,
                }
            }
        };

        trace!(target: "heap", cell = %id, ?class, domain = %domain, "cell allocated");
        Ok(id)
    }

    pub fn new_object(&mut self, domain: DomainId) -> Result<CellId, BridgeError> {
        self.try_allocate(ObjectClass::Plain, domain)
    }

    pub fn new_global(&mut self, domain: DomainId) -> Result<CellId, BridgeError> {
        self.try_allocate(ObjectClass::Global, domain)
    }

    pub fn new_script(&mut self, domain: DomainId) -> Result<CellId, BridgeError> {
        self.try_allocate(ObjectClass::Script, domain)
    }

    pub fn new_string(&mut self, domain: DomainId) -> Result<CellId, BridgeError> {
        self.try_allocate(ObjectClass::String, domain)
    }

    /// Outer proxy around `inner`, living in the inner object's domain
    pub fn new_outer_proxy(&mut self, inner: CellId) -> Result<CellId, BridgeError> {
        let domain = self.domain_of(inner).ok_or(BridgeError::DeadCell(inner))?;
        let outer = self.try_allocate(ObjectClass::OuterProxy, domain)?;
        self.set_slot(outer, 0, SlotValue::Object(inner));
        Ok(outer)
    }

    // ===== Cell access =====

    #[inline]
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.version == id.version)
            .and_then(|entry| entry.cell.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.version == id.version)
            .and_then(|entry| entry.cell.as_mut())
    }

    #[inline]
    pub fn is_live(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn class_of(&self, id: CellId) -> Option<ObjectClass> {
        self.get(id).map(Cell::class)
    }

    #[inline]
    pub fn domain_of(&self, id: CellId) -> Option<DomainId> {
        self.get(id).map(Cell::domain)
    }

    #[inline]
    pub fn color(&self, id: CellId) -> Option<Color> {
        self.get(id).map(Cell::color)
    }

    /// Collector-side color override
    pub fn set_color(&mut self, id: CellId, color: Color) {
        if let Some(cell) = self.get_mut(id) {
            cell.color = color;
        }
    }

    #[inline]
    pub fn slot(&self, id: CellId, index: usize) -> SlotValue {
        self.get(id).map(|cell| cell.slot(index)).unwrap_or_default()
    }

    /// Write a reserved slot; out-of-range writes grow the slot vector
    pub fn set_slot(&mut self, id: CellId, index: usize, value: SlotValue) {
        if let Some(cell) = self.get_mut(id) {
            if cell.slots.len() <= index {
                cell.slots.resize(index + 1, SlotValue::Undefined);
            }
            cell.slots[index] = value;
        }
    }

    pub(crate) fn set_private(&mut self, id: CellId, private: Private) {
        if let Some(cell) = self.get_mut(id) {
            cell.private = private;
        }
    }

    pub fn add_edge(&mut self, from: CellId, to: CellId) {
        if let Some(cell) = self.get_mut(from) {
            cell.edges.push(to);
        }
    }

    pub fn remove_edge(&mut self, from: CellId, to: CellId) {
        if let Some(cell) = self.get_mut(from) {
            cell.edges.retain(|edge| *edge != to);
        }
    }

    /// Follow forwarders and outer proxies to the object a handle stands for
    ///
    /// Bounded by the live cell count, so a malformed chain yields `None`
    /// instead of looping.
    pub fn resolve(&self, handle: CellId) -> Option<CellId> {
        let mut current = handle;
        for _ in 0..=self.live {
            let cell = self.get(current)?;
            match cell.class {
                ObjectClass::Forwarder | ObjectClass::OuterProxy => {
                    current = cell.slot(0).as_object()?;
                }
                _ => return Some(current),
            }
        }
        None
    }

    /// Live cells of a class, in index order
    pub fn cells_of_class(&self, class: ObjectClass) -> Vec<CellId> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry
                    .cell
                    .as_ref()
                    .filter(|cell| cell.class == class)
                    .map(|_| CellId {
                        index: index as u32,
                        version: entry.version,
                    })
            })
            .collect()
    }

    fn live_ids(&self) -> Vec<CellId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.cell.is_some())
            .map(|(index, entry)| CellId {
                index: index as u32,
                version: entry.version,
            })
            .collect()
    }

    // ===== Requests =====

    pub fn begin_request(&mut self) {
        self.request_depth += 1;
    }

    pub fn end_request(&mut self) {
        debug_assert!(self.request_depth > 0, "request depth underflow");
        self.request_depth = self.request_depth.saturating_sub(1);
    }

    #[inline]
    pub fn in_request(&self) -> bool {
        self.request_depth > 0
    }

    // ===== Collector simulation =====

    /// Recolor the heap the way the collector would at the end of marking:
    /// everything reachable from `black_roots` is black, everything else
    /// reachable from `gray_roots` is gray, the rest is white.
    pub fn mark_from_roots(&mut self, black_roots: &[CellId], gray_roots: &[CellId]) {
        for id in self.live_ids() {
            self.set_color(id, Color::White);
        }
        self.paint(black_roots.to_vec(), Color::Black);
        self.paint(gray_roots.to_vec(), Color::Gray);
    }

    /// Paint white cells reachable from `worklist`, and with `Black` also
    /// repaint gray ones
    fn paint(&mut self, mut worklist: Vec<CellId>, color: Color) {
        while let Some(id) = worklist.pop() {
            let Some(cell) = self.get_mut(id) else { continue };
            let repaint = match color {
                Color::Black => cell.color != Color::Black,
                _ => cell.color == Color::White,
            };
            if !repaint {
                continue;
            }
            cell.color = color;
            cell.for_each_child(|child| worklist.push(child));
        }
    }

    pub fn begin_incremental_mark(&mut self) {
        self.incremental.begin();
    }

    /// Scan everything the barrier queued, then leave the marking phase
    pub fn finish_incremental_mark(&mut self) {
        let mut queued = Vec::new();
        while let Some(id) = self.incremental.pop_marked() {
            if let Some(cell) = self.get(id) {
                cell.for_each_child(|child| queued.push(child));
            }
        }
        self.paint(queued, Color::Black);
        self.incremental.end();
    }

    #[inline]
    pub fn incremental(&self) -> &IncrementalState {
        &self.incremental
    }

    /// Reclaim every white cell, finalizing wrappers; returns the count
    pub fn sweep(&mut self) -> usize {
        let dead: Vec<CellId> = self
            .live_ids()
            .into_iter()
            .filter(|id| self.color(*id) == Some(Color::White))
            .collect();

        for &id in &dead {
            let entry = &mut self.entries[id.index as usize];
            let Some(cell) = entry.cell.take() else { continue };
            entry.version = entry.version.wrapping_add(1);
            self.free.push(id.index);
            self.live -= 1;
            finalize(id, cell);
        }

        self.reclaimed += dead.len();
        log_sweep(dead.len(), self.live);
        dead.len()
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_cells: self.live,
            reclaimed_cells: self.reclaimed,
            cells_unmarked: self.unmarked,
            barriers_fired: self.incremental.barriers_fired(),
        }
    }
}

/// Release whatever native state a reclaimed cell owned
fn finalize(id: CellId, cell: Cell) {
    let domain = cell.domain;
    match cell.private {
        Private::Native(native) => native.release_wrapper(domain, id),
        Private::Record(record) => record.into_native().release_wrapper(domain, id),
        Private::Interfaces(_) | Private::None => {}
    }
}

impl GrayMarking for Heap {
    #[inline]
    fn is_gray(&self, thing: GcThing) -> bool {
        self.color(thing.cell) == Some(Color::Gray)
    }

    fn unmark_gray_cell(&mut self, thing: GcThing) {
        let cleared = match self.get_mut(thing.cell) {
            Some(cell) if cell.color == Color::Gray => {
                cell.color = Color::Black;
                true
            }
            _ => false,
        };
        if cleared {
            self.unmarked += 1;
        }
    }

    #[inline]
    fn is_barrier_needed(&self, thing: GcThing) -> bool {
        self.incremental.is_marking() && self.is_live(thing.cell)
    }

    fn reference_barrier(&mut self, thing: GcThing) {
        let newly_marked = match self.get_mut(thing.cell) {
            Some(cell) if cell.color == Color::White => {
                cell.color = Color::Black;
                true
            }
            Some(_) => false,
            None => return,
        };
        self.incremental.record_barrier(thing.cell, newly_marked);
        log_barrier(thing.cell.index);
    }

    fn for_each_child(&self, thing: GcThing, f: &mut dyn FnMut(GcThing)) {
        if let Some(cell) = self.get(thing.cell) {
            cell.for_each_child(|child| {
                if let Some(kind) = self.get(child).map(Cell::kind) {
                    f(GcThing { cell: child, kind });
                }
            });
        }
    }

    #[inline]
    fn thing_index(&self, thing: GcThing) -> usize {
        thing.cell.index as usize
    }

    #[inline]
    fn index_bound(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn worklist_capacity_hint(&self) -> usize {
        self.config.gray.worklist_capacity
    }

    #[inline]
    fn in_request(&self) -> bool {
        Heap::in_request(self)
    }
}
