use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use ks_core::gc::{self, VisitFn};
use ks_core::{heap, object, weak};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

static LOCK: Mutex<()> = Mutex::new(());
static FINALIZED: AtomicUsize = AtomicUsize::new(0);

fn setup() -> MutexGuard<'static, ()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let guard = LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    gc::global().reset();
    FINALIZED.store(0, Ordering::SeqCst);
    guard
}

/// Object with up to two strong children. Its finalizer releases them.
#[repr(C)]
struct Node {
    kids: [*mut c_void; 2],
}

unsafe extern "C" fn node_traverse(obj: *mut c_void, visit: VisitFn, ctx: *mut c_void) {
    let node = unsafe { object::fields::<Node>(obj) };
    for &kid in &node.kids {
        if !kid.is_null() {
            unsafe { visit(kid, ctx) };
        }
    }
}

unsafe extern "C" fn node_finalize(obj: *mut c_void) {
    FINALIZED.fetch_add(1, Ordering::SeqCst);
    let node = unsafe { object::fields::<Node>(obj) };
    for kid in node.kids.iter_mut() {
        unsafe { heap::release(*kid) };
        *kid = ptr::null_mut();
    }
}

fn new_node() -> *mut c_void {
    let p = object::new_object(0x4E4F_4445, std::mem::size_of::<Node>());
    unsafe {
        object::set_finalizer(p, Some(node_finalize));
        gc::track(p, node_traverse);
    }
    p
}

/// Stores `kid` in slot `slot` of `parent`, taking a new reference.
fn link(parent: *mut c_void, slot: usize, kid: *mut c_void) {
    unsafe {
        heap::retain(kid);
        object::fields::<Node>(parent).kids[slot] = kid;
    }
}

/// Stores `kid` without retaining: the caller's reference moves into the edge.
fn link_owned(parent: *mut c_void, slot: usize, kid: *mut c_void) {
    unsafe { object::fields::<Node>(parent).kids[slot] = kid };
}

#[test]
fn mutual_pair_is_collected_in_one_pass() {
    let _g = setup();
    let a = new_node();
    let b = new_node();
    link_owned(a, 0, b);
    link_owned(b, 0, a);
    assert_eq!(gc::global().tracked_count(), 2);

    assert_eq!(gc::collect(), 2);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 2);
    assert_eq!(gc::global().tracked_count(), 0);
    assert_eq!(gc::global().total_collected(), 2);
    assert_eq!(gc::global().pass_count(), 1);
}

#[test]
fn externally_held_cycle_survives() {
    let _g = setup();
    let a = new_node();
    let b = new_node();
    link(a, 0, b);
    link(b, 0, a);
    // a: ours + b's edge. b: a's edge once our reference is dropped.
    unsafe { heap::release(b) };

    assert_eq!(gc::collect(), 0);
    assert!(gc::global().is_tracked(a));
    assert!(gc::global().is_tracked(b));
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 0);

    assert_eq!(unsafe { heap::release(a) }, 1);
    assert_eq!(gc::collect(), 2);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 2);
}

#[test]
fn cycle_reachable_from_a_rooted_object_is_restored() {
    let _g = setup();
    let root = new_node();
    let a = new_node();
    let b = new_node();
    link_owned(root, 0, a);
    link_owned(a, 0, b);
    link(b, 0, a);
    // root: ours. a: root + b. b: a.
    assert_eq!(gc::collect(), 0);
    assert_eq!(gc::global().tracked_count(), 3);

    // Dropping the root frees it by refcount; its finalizer drops the edge to a.
    assert_eq!(unsafe { heap::release(root) }, 0);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
    assert!(!gc::global().is_tracked(root));
    assert_eq!(gc::collect(), 2);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 3);
}

#[test]
fn collected_objects_release_outside_children() {
    let _g = setup();
    let a = new_node();
    let b = new_node();
    let leaf = new_node();
    gc::untrack(leaf);
    link_owned(a, 0, b);
    link_owned(b, 0, a);
    link(a, 1, leaf);
    assert_eq!(unsafe { heap::refcount(leaf) }, 2);

    assert_eq!(gc::collect(), 2);
    assert_eq!(unsafe { heap::refcount(leaf) }, 1);
    unsafe { heap::release(leaf) };
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 3);
}

#[test]
fn weak_handles_on_collected_objects_are_zeroed() {
    let _g = setup();
    let a = new_node();
    let b = new_node();
    link_owned(a, 0, b);
    link_owned(b, 0, a);
    let w = unsafe { weak::weak_new(a) };
    assert!(unsafe { weak::weak_alive(w) });
    gc::collect();
    unsafe {
        assert!(weak::weak_get(w).is_null());
        assert!(!weak::weak_alive(w));
        weak::weak_free(w);
    }
}

#[test]
fn self_loop_is_collected() {
    let _g = setup();
    let a = new_node();
    link_owned(a, 0, a);
    assert_eq!(gc::collect(), 1);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
}

#[test]
fn statistics_accumulate() {
    let _g = setup();
    assert_eq!(gc::collect(), 0);
    let a = new_node();
    link_owned(a, 0, a);
    gc::collect();
    gc::collect();
    assert_eq!(gc::global().pass_count(), 3);
    assert_eq!(gc::global().total_collected(), 1);
}

#[test]
fn track_and_untrack() {
    let _g = setup();
    let a = new_node();
    assert!(gc::global().is_tracked(a));
    assert!(gc::untrack(a));
    assert!(!gc::untrack(a));
    assert!(!gc::global().is_tracked(a));
    unsafe { heap::release(a) };
    assert_eq!(gc::global().tracked_count(), 0);
}

#[test]
fn freeing_a_tracked_object_untracks_it() {
    let _g = setup();
    let a = new_node();
    unsafe { heap::release(a) };
    assert_eq!(gc::global().tracked_count(), 0);
}

static TRAPPED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn collecting_finalizer(_: *mut c_void) {
    let result = std::panic::catch_unwind(gc::collect);
    if result.is_err() {
        TRAPPED.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn collect_from_a_finalizer_traps() {
    let _g = setup();
    let o = object::new_object(9, 8);
    unsafe {
        object::set_finalizer(o, Some(collecting_finalizer));
        heap::release(o);
    }
    assert_eq!(TRAPPED.load(Ordering::SeqCst), 1);
    assert_eq!(gc::global().pass_count(), 0);
}

#[test]
fn allocation_threshold_triggers_collection() {
    let _g = setup();
    let a = new_node();
    link_owned(a, 0, a);
    gc::global().set_threshold(3);
    let keep: Vec<_> = (0..3).map(|_| object::new_object(1, 8)).collect();
    assert_eq!(gc::global().pass_count(), 1);
    assert_eq!(gc::global().total_collected(), 1);
    gc::global().set_threshold(0);
    for o in keep {
        unsafe { heap::release(o) };
    }
}

#[test]
fn run_all_finalizers_empties_the_set() {
    let _g = setup();
    let a = new_node();
    let b = new_node();
    assert_eq!(gc::global().run_all_finalizers(), 2);
    assert_eq!(gc::global().tracked_count(), 0);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 2);
    unsafe {
        heap::release(a);
        heap::release(b);
    }
    // Finalizers never run twice.
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 2);
}

static SLOW_STARTED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn slow_finalize(_: *mut c_void) {
    SLOW_STARTED.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(200));
    FINALIZED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn collection_leaves_a_releasing_object_to_its_releaser() {
    let _g = setup();
    SLOW_STARTED.store(false, Ordering::SeqCst);
    let p = object::new_object(0x534C_4F57, std::mem::size_of::<Node>());
    unsafe {
        object::set_finalizer(p, Some(slow_finalize));
        gc::track(p, node_traverse);
    }
    let addr = p as usize;
    let releaser = thread::spawn(move || unsafe { heap::release(addr as *mut c_void) });
    while !SLOW_STARTED.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    assert!(!gc::global().is_tracked(p));
    assert_eq!(gc::collect(), 0);
    assert_eq!(releaser.join().unwrap(), 0);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
    assert_eq!(gc::global().total_collected(), 0);
    assert_eq!(gc::global().tracked_count(), 0);
}

/// Like `new_node`, but tracked only once `track_all` runs, after its
/// edges are in place.
fn untracked_node() -> *mut c_void {
    let p = object::new_object(0x4E4F_4445, std::mem::size_of::<Node>());
    unsafe { object::set_finalizer(p, Some(node_finalize)) };
    p
}

fn track_all(nodes: &[*mut c_void]) {
    for &n in nodes {
        unsafe { gc::track(n, node_traverse) };
    }
}

#[test]
fn collection_races_with_releases_on_other_threads() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 500;
    let _g = setup();
    let done = std::sync::Arc::new(AtomicBool::new(false));
    let collector = {
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                gc::collect();
            }
        })
    };
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn(|| {
                for _ in 0..ROUNDS {
                    // A garbage pair, left for the collector.
                    let (a, b) = (untracked_node(), untracked_node());
                    link(a, 0, b);
                    link(b, 0, a);
                    track_all(&[a, b]);
                    // A chain, freed by refcount.
                    let (c, d) = (untracked_node(), untracked_node());
                    link_owned(c, 0, d);
                    track_all(&[c, d]);
                    unsafe {
                        heap::release(a);
                        heap::release(b);
                        assert_eq!(heap::release(c), 0);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    collector.join().unwrap();
    gc::collect();

    assert_eq!(gc::global().tracked_count(), 0);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), THREADS * ROUNDS * 4);
    assert_eq!(gc::global().total_collected(), (THREADS * ROUNDS * 2) as u64);
}

fn reachable(n: usize, edges: &[(usize, usize, usize)], roots: &[bool]) -> Vec<bool> {
    let mut seen = roots.to_vec();
    let mut stack: Vec<usize> = (0..n).filter(|&i| roots[i]).collect();
    while let Some(i) = stack.pop() {
        for &(from, _, to) in edges {
            if from == i && !seen[to] {
                seen[to] = true;
                stack.push(to);
            }
        }
    }
    seen
}

fn graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, usize)>, Vec<bool>)> {
    (1usize..12).prop_flat_map(|n| {
        let edges = proptest::collection::vec((0..n, 0..2usize, 0..n), 0..(2 * n));
        let roots = proptest::collection::vec(any::<bool>(), n);
        (Just(n), edges, roots)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48, max_shrink_iters: 200, .. ProptestConfig::default()
    })]
    #[test]
    fn collection_frees_exactly_the_unreachable((n, raw_edges, roots) in graph()) {
        let _g = setup();
        let nodes: Vec<_> = (0..n).map(|_| new_node()).collect();
        let mut edges = Vec::new();
        let mut used = vec![[false; 2]; n];
        for (from, slot, to) in raw_edges {
            if !used[from][slot] {
                used[from][slot] = true;
                link(nodes[from], slot, nodes[to]);
                edges.push((from, slot, to));
            }
        }
        let weaks: Vec<_> = nodes.iter().map(|&p| unsafe { weak::weak_new(p) }).collect();
        for i in 0..n {
            if !roots[i] {
                unsafe { heap::release(nodes[i]) };
            }
        }

        gc::collect();
        let expect = reachable(n, &edges, &roots);
        for i in 0..n {
            prop_assert_eq!(unsafe { weak::weak_alive(weaks[i]) }, expect[i], "node {}", i);
        }

        for i in 0..n {
            if roots[i] {
                unsafe { heap::release(nodes[i]) };
            }
        }
        gc::collect();
        for &w in &weaks {
            let alive = unsafe { weak::weak_alive(w) };
            prop_assert!(!alive);
            unsafe { weak::weak_free(w) };
        }
        prop_assert_eq!(gc::global().tracked_count(), 0);
        prop_assert_eq!(FINALIZED.load(Ordering::SeqCst), n);
    }
}
