//! Scoped worker pool.
//!
//! Workers pull items from a shared queue and send results back over one
//! channel, which is the only place results are accumulated. Output order
//! matches input order. A width of 1 runs inline on the calling thread.

use std::num::NonZeroUsize;
use std::sync::{mpsc, Mutex};
use std::thread;

pub(crate) fn map_ordered<T, R, F>(items: Vec<T>, workers: NonZeroUsize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let width = workers.get().min(total);
    if width <= 1 {
        return items.into_iter().map(f).collect();
    }

    let queue = Mutex::new(items.into_iter().enumerate());
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..width {
            let tx = tx.clone();
            let queue = &queue;
            let f = &f;
            scope.spawn(move || loop {
                let next = queue.lock().unwrap_or_else(|e| e.into_inner()).next();
                let Some((index, item)) = next else { break };
                if tx.send((index, f(item))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn width(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn preserves_input_order() {
        let out = map_ordered((0..100).collect(), width(8), |i: u32| i * 2);
        assert_eq!(out, (0..100).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn every_item_is_processed_once() {
        let calls = AtomicUsize::new(0);
        let out = map_ordered((0..57).collect(), width(4), |i: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            i
        });
        assert_eq!(calls.load(Ordering::SeqCst), 57);
        assert_eq!(out.into_iter().collect::<HashSet<_>>().len(), 57);
    }

    #[test]
    fn single_worker_runs_on_calling_thread() {
        let caller = thread::current().id();
        let ids = map_ordered(vec![1, 2, 3], width(1), |_: i32| thread::current().id());
        assert!(ids.iter().all(|id| *id == caller));
    }

    #[test]
    fn empty_input() {
        let out: Vec<i32> = map_ordered(Vec::<i32>::new(), width(4), |i| i);
        assert!(out.is_empty());
    }
}
