//! Aggregate results carrying a completion proportion.

use serde::Serialize;

/// Ordered results of an aggregate, with the fraction of work completed.
///
/// The combinators hand the same value to progress listeners after every
/// completed constituent and fulfill with it once everything is done, at
/// which point [`proportion`](Self::proportion) is exactly `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate<T> {
    /// Result slots in input order
    slots: Vec<Option<T>>,

    /// Constituents fulfilled so far
    completed: usize,

    /// Constituents in the aggregate
    total: usize,

    /// `completed / total`, or 1 for an empty aggregate
    proportion: f64,
}

impl<T> Aggregate<T> {
    /// Pre-sized slots, one per constituent, filled in any order.
    pub(crate) fn slotted(total: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(total).collect(),
            completed: 0,
            total,
            proportion: Self::ratio(0, total),
        }
    }

    /// Slots appended one step at a time.
    pub(crate) fn growing(total: usize) -> Self {
        Self {
            slots: Vec::with_capacity(total),
            completed: 0,
            total,
            proportion: Self::ratio(0, total),
        }
    }

    /// Store the value of the constituent at `index`.
    pub(crate) fn fill(&mut self, index: usize, value: T) {
        let slot = &mut self.slots[index];
        debug_assert!(slot.is_none(), "constituent {} settled twice", index);
        *slot = Some(value);
        self.record_completion();
    }

    /// Append the value of the next step.
    pub(crate) fn push(&mut self, value: T) {
        self.slots.push(Some(value));
        self.record_completion();
    }

    /// Pin the proportion once every constituent has fulfilled.
    pub(crate) fn finish(&mut self) {
        debug_assert!(self.is_complete());
        self.proportion = 1.0;
    }

    fn record_completion(&mut self) {
        self.completed += 1;
        self.proportion = Self::ratio(self.completed, self.total);
    }

    fn ratio(completed: usize, total: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        }
    }

    /// Fraction of constituents fulfilled, in `[0, 1]`.
    pub fn proportion(&self) -> f64 {
        self.proportion
    }

    /// Completion as a percentage (0-100), at the same precision as
    /// [`proportion`](Self::proportion).
    pub fn percentage(&self) -> f64 {
        self.proportion * 100.0
    }

    /// Constituents fulfilled so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Constituents in the aggregate.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether every constituent has fulfilled.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Number of result slots.
    ///
    /// A parallel aggregate has one slot per constituent from the start; a
    /// sequential one gains a slot per completed step.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no result slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Result at `index`, if that constituent has fulfilled.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Iterate the slots in input order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.slots.iter().map(Option::as_ref)
    }

    /// Results received so far, in input order, skipping empty slots.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().flatten()
    }

    /// Take the results out, or `None` if some constituent has not fulfilled.
    pub fn into_values(self) -> Option<Vec<T>> {
        self.slots.into_iter().collect()
    }
}
