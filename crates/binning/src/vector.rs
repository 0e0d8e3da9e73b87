//! Feature vector views and the growable sample buffer.
//!
//! A bin stores all aggregator features in one flat `f32` array. Each
//! aggregator only ever sees its own `[offset, offset + len)` window of that
//! array through [`Vector`] (read) or [`VectorMut`] (read/write). Indexing
//! outside the window panics.

use std::fmt;

/// Read-only window into a feature array.
#[derive(Clone, Copy)]
pub struct Vector<'a> {
    values: &'a [f32],
}

impl<'a> Vector<'a> {
    /// Wrap an entire slice.
    pub fn new(values: &'a [f32]) -> Self {
        Self { values }
    }

    /// Window `[offset, offset + len)` of `values`.
    pub fn window(values: &'a [f32], offset: usize, len: usize) -> Self {
        Self {
            values: &values[offset..offset + len],
        }
    }

    /// Number of features in the window.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Get the feature at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.values[index]
    }

    /// The window as a slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.values
    }
}

impl fmt::Debug for Vector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

/// Read/write window into a feature array.
pub struct VectorMut<'a> {
    values: &'a mut [f32],
}

impl<'a> VectorMut<'a> {
    /// Wrap an entire slice.
    pub fn new(values: &'a mut [f32]) -> Self {
        Self { values }
    }

    /// Window `[offset, offset + len)` of `values`.
    pub fn window(values: &'a mut [f32], offset: usize, len: usize) -> Self {
        Self {
            values: &mut values[offset..offset + len],
        }
    }

    /// Number of features in the window.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Get the feature at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.values[index]
    }

    /// Set the feature at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        self.values[index] = value;
    }

    /// Set every feature in the window to `value`.
    pub fn fill(&mut self, value: f32) {
        self.values.fill(value);
    }

    /// Read-only view of the same window.
    pub fn as_vector(&self) -> Vector<'_> {
        Vector::new(self.values)
    }

    /// The window as a slice.
    pub fn as_slice(&self) -> &[f32] {
        self.values
    }
}

impl fmt::Debug for VectorMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

/// Append-only `f32` buffer for aggregators that need the full sample set.
///
/// Capacity doubles when exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowableVector {
    elements: Vec<f32>,
}

impl GrowableVector {
    /// Create an empty buffer with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    /// Append one value.
    pub fn add(&mut self, value: f32) {
        if self.elements.len() == self.elements.capacity() {
            let additional = self.elements.capacity().max(8);
            self.elements.reserve_exact(additional);
        }
        self.elements.push(value);
    }

    /// Number of stored values.
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get the value at `index`.
    pub fn get(&self, index: usize) -> f32 {
        self.elements[index]
    }

    /// The stored values in insertion order.
    pub fn elements(&self) -> &[f32] {
        &self.elements
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.elements.iter().copied()
    }

    /// Copy of the stored values in ascending total order.
    pub fn sorted(&self) -> Vec<f32> {
        let mut values = self.elements.clone();
        values.sort_by(f32::total_cmp);
        values
    }

    /// Remove all values, keeping the allocation.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl From<Vec<f32>> for GrowableVector {
    fn from(elements: Vec<f32>) -> Self {
        Self { elements }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let v = Vector::window(&values, 1, 3);
        assert_eq!(v.size(), 3);
        assert_eq!(v.get(0), 2.0);
        assert_eq!(v.get(2), 4.0);
    }

    #[test]
    #[should_panic]
    fn test_window_access_outside_panics() {
        let values = [1.0, 2.0, 3.0];
        let v = Vector::window(&values, 0, 2);
        v.get(2);
    }

    #[test]
    fn test_writable_window_only_touches_own_range() {
        let mut values = [0.0f32; 6];
        {
            let mut w = VectorMut::window(&mut values, 2, 2);
            w.set(0, 7.0);
            w.set(1, 8.0);
        }
        assert_eq!(values, [0.0, 0.0, 7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn test_growable_vector_grows() {
        let mut gv = GrowableVector::with_capacity(1);
        for i in 0..100 {
            gv.add(i as f32);
        }
        assert_eq!(gv.size(), 100);
        assert_eq!(gv.get(42), 42.0);
        assert_eq!(gv.iter().sum::<f32>(), 4950.0);
    }

    #[test]
    fn test_growable_vector_sorted() {
        let gv = GrowableVector::from(vec![3.0, -1.0, 2.0]);
        assert_eq!(gv.sorted(), vec![-1.0, 2.0, 3.0]);
        // insertion order untouched
        assert_eq!(gv.elements(), &[3.0, -1.0, 2.0]);
    }
}
