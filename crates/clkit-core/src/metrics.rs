#![cfg(feature = "metrics")]

//! Opt-in latency and allocation counters for the wrapper calls.

use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

static TIMES: Lazy<Mutex<Vec<(&'static str, u128)>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Called by the wrappers: `record("enqueue_write", Instant::now())`.
pub fn record(name: &'static str, start: Instant) {
    let dur = start.elapsed().as_micros();
    TIMES.lock().unwrap().push((name, dur));
}

/// Live buffer allocations and their total size, kept by `GpuBuffer`.
pub static ALLOCS: AtomicUsize = AtomicUsize::new(0);
pub static ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Prints per-operation latency and the allocation counters; call once at
/// the end of a run.
pub fn summary() {
    let mut map: HashMap<&str, Vec<u128>> = HashMap::new();
    {
        let mut times = TIMES.lock().unwrap();
        for (name, us) in times.drain(..) {
            map.entry(name).or_default().push(us);
        }
    }

    println!("── metrics summary ──");
    for (name, mut v) in map {
        v.sort_unstable();
        let mean = v.iter().sum::<u128>() / v.len() as u128;
        let p95 = v[((v.len() * 95) / 100).saturating_sub(1)];
        println!("{:<18} mean={:>5} µs   p95={:>5} µs", name, mean, p95);
    }

    let allocs = ALLOCS.load(Ordering::Relaxed);
    let bytes = ALLOC_BYTES.load(Ordering::Relaxed);
    println!("live GPU allocations: {}   ({} KiB)", allocs, bytes / 1024);
}
