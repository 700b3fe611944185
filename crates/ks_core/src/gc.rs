//! Trial-deletion cycle collector.
//!
//! Objects that can take part in reference cycles are registered with a
//! traverse callback enumerating their strong children. Weak edges must
//! never be reported by a traverser. A pass runs in five phases:
//!
//! 1. snapshot the tracked set with each object's refcount as its trial count
//! 2. decrement the trial count of every tracked child of every tracked object
//! 3. objects left at zero are candidates; the rest are externally rooted
//! 4. everything reachable from a rooted object is rooted too
//! 5. the remaining candidates are garbage: their internal edges are broken,
//!    weak handles cleared, finalizers run and memory reclaimed
//!
//! The tracked-set mutex is held for phases 1-4 only.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;

use crate::config::{GC_DEFAULT_THRESHOLD, GC_INITIAL_CAPACITY, GC_MAX_LOAD_DEN, GC_MAX_LOAD_NUM};
use crate::heap::{self, FLAG_COLLECTING, FLAG_TRACKED, FLAG_WEAK_TARGET};
use crate::trap::{messages, trap};
use crate::{FastHashMap, FastHashSet};

/// Called once per strong child with the `ctx` handed to the traverser.
pub type VisitFn = unsafe extern "C" fn(child: *mut c_void, ctx: *mut c_void);

/// Enumerates the strong children of `obj` by calling `visit(child, ctx)`.
pub type TraverseFn = unsafe extern "C" fn(obj: *mut c_void, visit: VisitFn, ctx: *mut c_void);

// ==================== Tracked set ====================

#[derive(Clone, Copy)]
enum Slot {
    Empty,
    Tombstone,
    Live { addr: usize, traverse: TraverseFn },
}

/// Open-addressing table keyed by payload address: power-of-two capacity,
/// linear probing, tombstone deletion.
struct TrackedSet {
    slots: Vec<Slot>,
    live: usize,
    tombstones: usize,
}

#[inline]
fn mix(addr: usize) -> u64 {
    // splitmix64 finaliser; payload addresses share their low bits.
    let mut z = (addr as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl TrackedSet {
    fn with_capacity(cap: usize) -> Self {
        debug_assert!(cap.is_power_of_two());
        Self {
            slots: vec![Slot::Empty; cap],
            live: 0,
            tombstones: 0,
        }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn find(&self, addr: usize) -> Option<usize> {
        let mask = self.mask();
        let mut i = mix(addr) as usize & mask;
        loop {
            match self.slots[i] {
                Slot::Empty => return None,
                Slot::Live { addr: a, .. } if a == addr => return Some(i),
                _ => i = (i + 1) & mask,
            }
        }
    }

    /// Returns `false` when `addr` was already present (its callback is replaced).
    fn insert(&mut self, addr: usize, traverse: TraverseFn) -> bool {
        if let Some(i) = self.find(addr) {
            self.slots[i] = Slot::Live { addr, traverse };
            return false;
        }
        if (self.live + self.tombstones + 1) * GC_MAX_LOAD_DEN > self.slots.len() * GC_MAX_LOAD_NUM {
            self.rehash();
        }
        let mask = self.mask();
        let mut i = mix(addr) as usize & mask;
        loop {
            match self.slots[i] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    self.tombstones -= 1;
                    break;
                }
                Slot::Live { .. } => i = (i + 1) & mask,
            }
        }
        self.slots[i] = Slot::Live { addr, traverse };
        self.live += 1;
        true
    }

    fn remove(&mut self, addr: usize) -> bool {
        match self.find(addr) {
            Some(i) => {
                self.slots[i] = Slot::Tombstone;
                self.live -= 1;
                self.tombstones += 1;
                true
            }
            None => false,
        }
    }

    /// Drops tombstones, doubling capacity while live entries would still
    /// fill more than half the load budget.
    fn rehash(&mut self) {
        let mut cap = self.slots.len();
        while (self.live + 1) * 2 * GC_MAX_LOAD_DEN > cap * GC_MAX_LOAD_NUM {
            cap *= 2;
        }
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; cap]);
        self.live = 0;
        self.tombstones = 0;
        for slot in old {
            if let Slot::Live { addr, traverse } = slot {
                self.insert(addr, traverse);
            }
        }
    }

    fn entries(&self) -> impl Iterator<Item = (usize, TraverseFn)> + '_ {
        self.slots.iter().filter_map(|s| match *s {
            Slot::Live { addr, traverse } => Some((addr, traverse)),
            _ => None,
        })
    }
}

// ==================== Pass state ====================

struct Node {
    addr: usize,
    traverse: TraverseFn,
    trial: usize,
    rooted: bool,
}

struct Pass {
    nodes: Vec<Node>,
    index: FastHashMap<usize, usize>,
    stack: Vec<usize>,
}

unsafe extern "C" fn visit_trial(child: *mut c_void, ctx: *mut c_void) {
    let pass = unsafe { &mut *ctx.cast::<Pass>() };
    if let Some(&j) = pass.index.get(&(child as usize)) {
        let node = &mut pass.nodes[j];
        node.trial = node.trial.saturating_sub(1);
    }
}

unsafe extern "C" fn visit_restore(child: *mut c_void, ctx: *mut c_void) {
    let pass = unsafe { &mut *ctx.cast::<Pass>() };
    if let Some(&j) = pass.index.get(&(child as usize)) {
        if !pass.nodes[j].rooted {
            pass.nodes[j].rooted = true;
            pass.stack.push(j);
        }
    }
}

unsafe extern "C" fn visit_break(child: *mut c_void, ctx: *mut c_void) {
    let members = unsafe { &*ctx.cast::<FastHashSet<usize>>() };
    if members.contains(&(child as usize)) {
        let h = unsafe { heap::header(child) };
        if h.refcnt.fetch_sub(1, Ordering::AcqRel) == 0 {
            trap(messages::REFCOUNT_UNDERFLOW);
        }
    }
}

impl Pass {
    fn snapshot(set: &TrackedSet) -> Self {
        let mut nodes = Vec::with_capacity(set.live);
        let mut index = FastHashMap::default();
        for (addr, traverse) in set.entries() {
            let trial = unsafe { heap::refcount(addr as *mut c_void) };
            // Already dropped to zero; its releasing thread owns it.
            if trial == 0 {
                continue;
            }
            index.insert(addr, nodes.len());
            nodes.push(Node {
                addr,
                traverse,
                trial,
                rooted: false,
            });
        }
        Self {
            nodes,
            index,
            stack: Vec::new(),
        }
    }

    fn visit_children(&mut self, i: usize, visit: VisitFn) {
        let (addr, traverse) = (self.nodes[i].addr, self.nodes[i].traverse);
        let ctx = (self as *mut Pass).cast::<c_void>();
        unsafe { traverse(addr as *mut c_void, visit, ctx) };
    }

    fn trial_decrement(&mut self) {
        for i in 0..self.nodes.len() {
            self.visit_children(i, visit_trial);
        }
    }

    fn restore(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.rooted = node.trial > 0;
            if node.rooted {
                self.stack.push(i);
            }
        }
        while let Some(i) = self.stack.pop() {
            self.visit_children(i, visit_restore);
        }
    }

    fn condemned(&self) -> Vec<(usize, TraverseFn)> {
        self.nodes
            .iter()
            .filter(|n| !n.rooted)
            .map(|n| (n.addr, n.traverse))
            .collect()
    }
}

// ==================== Collector ====================

pub struct Collector {
    set: Mutex<TrackedSet>,
    pass: Mutex<()>,
    collected: AtomicU64,
    passes: AtomicU64,
    threshold: AtomicUsize,
    since_last: AtomicUsize,
}

static GLOBAL: LazyLock<Collector> = LazyLock::new(Collector::new);

/// The process-wide collector.
pub fn global() -> &'static Collector {
    &GLOBAL
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            set: Mutex::new(TrackedSet::with_capacity(GC_INITIAL_CAPACITY)),
            pass: Mutex::new(()),
            collected: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            threshold: AtomicUsize::new(GC_DEFAULT_THRESHOLD),
            since_last: AtomicUsize::new(0),
        }
    }

    fn lock_set(&self) -> MutexGuard<'_, TrackedSet> {
        self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `payload`. The set holds no reference of its own.
    ///
    /// # Safety
    /// `payload` must be a live payload; `traverse` must report exactly its
    /// strong children.
    pub unsafe fn track(&self, payload: *mut c_void, traverse: TraverseFn) {
        let mut set = self.lock_set();
        set.insert(payload as usize, traverse);
        unsafe { heap::set_flags(payload, FLAG_TRACKED) };
    }

    /// Returns whether `payload` was tracked.
    pub fn untrack(&self, payload: *mut c_void) -> bool {
        let mut set = self.lock_set();
        let removed = set.remove(payload as usize);
        if removed {
            unsafe { heap::clear_flags(payload, FLAG_TRACKED) };
        }
        removed
    }

    /// Hands a zero-refcount payload to the thread reclaiming it. Returns
    /// `false` when a pass has already condemned it.
    ///
    /// # Safety
    /// `payload` must be live with a zero refcount.
    pub(crate) unsafe fn claim(&self, payload: *mut c_void) -> bool {
        let mut set = self.lock_set();
        if set.remove(payload as usize) {
            unsafe { heap::clear_flags(payload, FLAG_TRACKED) };
            return true;
        }
        let bits = unsafe { heap::flags(payload) };
        bits & FLAG_COLLECTING == 0
    }

    pub fn is_tracked(&self, payload: *mut c_void) -> bool {
        self.lock_set().find(payload as usize).is_some()
    }

    pub fn tracked_count(&self) -> usize {
        self.lock_set().live
    }

    pub fn total_collected(&self) -> u64 {
        self.collected.load(Ordering::Relaxed)
    }

    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Collect automatically every `n` object allocations; 0 disables.
    pub fn set_threshold(&self, n: usize) {
        self.threshold.store(n, Ordering::Relaxed);
        self.since_last.store(0, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn notify_alloc(&self) {
        let threshold = self.threshold.load(Ordering::Relaxed);
        if threshold == 0 {
            return;
        }
        let n = self.since_last.fetch_add(1, Ordering::Relaxed) + 1;
        if n < threshold || heap::in_finalizer() {
            return;
        }
        self.since_last.store(0, Ordering::Relaxed);
        log::trace!("allocation threshold {threshold} reached");
        self.collect();
    }

    /// Runs one pass and returns the number of objects freed.
    pub fn collect(&self) -> usize {
        if heap::in_finalizer() {
            trap(messages::COLLECT_IN_FINALIZER);
        }
        // Serialises passes only. It stays held while condemned finalizers
        // run; re-entry from one of them traps above.
        let _pass = self.pass.lock().unwrap_or_else(PoisonError::into_inner);
        let (tracked, condemned) = self.find_garbage();
        let freed = unsafe { reclaim(&condemned) };
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.collected.fetch_add(freed as u64, Ordering::Relaxed);
        log::debug!("gc pass: {tracked} tracked, {freed} collected");
        freed
    }

    fn find_garbage(&self) -> (usize, Vec<(usize, TraverseFn)>) {
        let mut set = self.lock_set();
        let mut pass = Pass::snapshot(&set);
        pass.trial_decrement();
        pass.restore();
        let condemned = pass.condemned();
        for &(addr, _) in &condemned {
            set.remove(addr);
            let p = addr as *mut c_void;
            unsafe {
                heap::clear_flags(p, FLAG_TRACKED);
                heap::set_flags(p, FLAG_COLLECTING);
            }
        }
        (pass.nodes.len(), condemned)
    }

    /// Runs the finalizer of every tracked object once and empties the set.
    /// Memory is not reclaimed. Intended for process shutdown.
    pub fn run_all_finalizers(&self) -> usize {
        let entries: Vec<usize> = {
            let mut set = self.lock_set();
            let entries = set.entries().map(|(addr, _)| addr).collect();
            *set = TrackedSet::with_capacity(GC_INITIAL_CAPACITY);
            entries
        };
        let mut ran = 0;
        for addr in entries {
            let p = addr as *mut c_void;
            unsafe {
                heap::clear_flags(p, FLAG_TRACKED);
                if let Some(f) = heap::take_finalizer(p) {
                    heap::run_finalizer(f, p);
                    ran += 1;
                }
            }
        }
        ran
    }

    /// Forgets every tracked object and zeroes the statistics.
    #[doc(hidden)]
    pub fn reset(&self) {
        *self.lock_set() = TrackedSet::with_capacity(GC_INITIAL_CAPACITY);
        self.collected.store(0, Ordering::Relaxed);
        self.passes.store(0, Ordering::Relaxed);
        self.threshold.store(GC_DEFAULT_THRESHOLD, Ordering::Relaxed);
        self.since_last.store(0, Ordering::Relaxed);
    }
}

/// Breaks the condemned objects' internal edges, then clears weak handles,
/// runs finalizers and frees. Every condemned object stays allocated until
/// all finalizers have run.
unsafe fn reclaim(condemned: &[(usize, TraverseFn)]) -> usize {
    if condemned.is_empty() {
        return 0;
    }
    let members: FastHashSet<usize> = condemned.iter().map(|&(addr, _)| addr).collect();
    let ctx = (&members as *const FastHashSet<usize>).cast_mut().cast::<c_void>();
    for &(addr, traverse) in condemned {
        unsafe { traverse(addr as *mut c_void, visit_break, ctx) };
    }
    for &(addr, _) in condemned {
        let p = addr as *mut c_void;
        unsafe {
            if heap::flags(p) & FLAG_WEAK_TARGET != 0 {
                crate::weak::clear_for(p);
            }
        }
    }
    for &(addr, _) in condemned {
        let p = addr as *mut c_void;
        unsafe {
            if let Some(f) = heap::take_finalizer(p) {
                heap::run_finalizer(f, p);
            }
        }
    }

    let mut doomed = Vec::with_capacity(condemned.len());
    for &(addr, _) in condemned {
        let p = addr as *mut c_void;
        let rc = unsafe { heap::refcount(p) };
        if rc == 0 {
            doomed.push(p);
        } else {
            log::warn!("gc: {p:p} kept {rc} references after its cycle was broken");
            unsafe { heap::clear_flags(p, FLAG_COLLECTING) };
        }
    }
    let mut pending: SmallVec<[*mut c_void; 8]> = SmallVec::new();
    for &p in &doomed {
        unsafe { heap::release_elements(p, &mut pending) };
    }
    for &p in &doomed {
        unsafe { heap::free_block(p) };
    }
    for p in pending {
        unsafe { heap::reclaim(p) };
    }
    doomed.len()
}

// ==================== Free functions ====================

/// # Safety
/// See `Collector::track`.
pub unsafe fn track(payload: *mut c_void, traverse: TraverseFn) {
    unsafe { global().track(payload, traverse) }
}

pub fn untrack(payload: *mut c_void) -> bool {
    global().untrack(payload)
}

pub fn collect() -> usize {
    global().collect()
}
