//! Spinner pool for concurrent progress display.
//!
//! A fixed number of spinner "slots" are claimed and released by concurrent
//! tasks identified by a key (a listing URL, a file name). An optional byte
//! bar below the slots tracks the whole batch.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

/// A pool of reusable spinner slots for displaying concurrent task progress.
pub(crate) struct SpinnerPool<K> {
    mp: MultiProgress,
    spinners: Vec<ProgressBar>,
    total: Option<ProgressBar>,
    slot_assignments: HashMap<K, usize>,
    free_slots: Vec<usize>,
}

impl<K: Eq + Hash> SpinnerPool<K> {
    /// Create a pool with `n` slots. When `quiet` is true nothing is drawn.
    ///
    /// Slots stay invisible until claimed, so idle slots leave no blank lines.
    pub(crate) fn new(n: usize, quiet: bool) -> Self {
        let mp = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let spinner_style = ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .expect("static pattern")
            .tick_chars("/-\\|");

        let spinners: Vec<ProgressBar> = (0..n)
            .map(|_| {
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(spinner_style.clone());
                pb
            })
            .collect();

        let free_slots = (0..n).rev().collect();

        Self {
            mp,
            spinners,
            total: None,
            slot_assignments: HashMap::new(),
            free_slots,
        }
    }

    /// Add a byte bar for the batch, drawn below the spinner slots.
    pub(crate) fn with_total_bar(mut self, total_bytes: u64) -> Self {
        let style = ProgressStyle::with_template(
            "  [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {msg}",
        )
        .expect("static pattern")
        .progress_chars("=> ");
        let bar = self.mp.add(ProgressBar::new(total_bytes));
        bar.set_style(style);
        self.total = Some(bar);
        self
    }

    /// Claim a spinner slot for the given key and set its message. When every
    /// slot is taken the key is simply not shown.
    pub(crate) fn claim(&mut self, key: K, msg: String) {
        if self.slot_assignments.contains_key(&key) {
            self.update(&key, msg);
            return;
        }
        let Some(slot) = self.free_slots.pop() else {
            return;
        };
        let spinner = &self.spinners[slot];
        spinner.reset();
        spinner.enable_steady_tick(TICK);
        spinner.set_message(msg);
        self.slot_assignments.insert(key, slot);
    }

    /// Update the message for a claimed slot. No-op if the key has no slot.
    pub(crate) fn update(&self, key: &K, msg: String) {
        if let Some(&slot) = self.slot_assignments.get(key) {
            self.spinners[slot].set_message(msg);
        }
    }

    /// Hand a key's slot back to the pool and blank its line.
    pub(crate) fn release(&mut self, key: &K) {
        let Some(slot) = self.slot_assignments.remove(key) else {
            return;
        };
        blank(&self.spinners[slot]);
        self.free_slots.push(slot);
    }

    pub(crate) fn add_bytes(&self, bytes: u64) {
        if let Some(bar) = &self.total {
            bar.inc(bytes);
        }
    }

    /// Bytes that were not known up front; grows the bar instead of
    /// overflowing it.
    pub(crate) fn add_length(&self, bytes: u64) {
        if let Some(bar) = &self.total {
            bar.inc_length(bytes);
        }
    }

    pub(crate) fn set_total_message(&self, msg: String) {
        if let Some(bar) = &self.total {
            bar.set_message(msg);
        }
    }

    /// Print a line above the bars without tearing them.
    pub(crate) fn println(&self, line: impl FnOnce()) {
        self.mp.suspend(line);
    }

    /// Blank every line, drop the byte bar and free all slots.
    pub(crate) fn clear_all(&mut self) {
        self.spinners.iter().for_each(blank);
        if let Some(bar) = self.total.take() {
            bar.finish_and_clear();
        }
        self.slot_assignments.clear();
        self.free_slots = (0..self.spinners.len()).rev().collect();
    }
}

fn blank(spinner: &ProgressBar) {
    spinner.disable_steady_tick();
    spinner.set_message("");
    spinner.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_reused() {
        let mut pool: SpinnerPool<&str> = SpinnerPool::new(2, true);
        pool.claim("a", "a".into());
        pool.claim("b", "b".into());
        // No slot left: ignored
        pool.claim("c", "c".into());
        assert_eq!(pool.slot_assignments.len(), 2);
        assert!(!pool.slot_assignments.contains_key("c"));

        pool.release(&"a");
        pool.claim("c", "c".into());
        assert!(pool.slot_assignments.contains_key("c"));

        pool.clear_all();
        assert!(pool.slot_assignments.is_empty());
        assert_eq!(pool.free_slots.len(), 2);
    }

    #[test]
    fn test_reclaiming_a_key_keeps_its_slot() {
        let mut pool: SpinnerPool<&str> = SpinnerPool::new(2, true);
        pool.claim("a", "first".into());
        pool.claim("a", "second".into());
        assert_eq!(pool.slot_assignments.len(), 1);
        assert_eq!(pool.free_slots.len(), 1);
    }
}
