//! Spatial and temporal bins.
//!
//! A bin is the aggregated state of one grid cell. [`SpatialBin`] holds the
//! state of a single pass, [`TemporalBin`] the state accumulated over all
//! passes of the binning period. Both keep every aggregator's features in one
//! flat `f32` array; the layout is owned by the [`crate::BinManager`].
//!
//! # Record formats
//!
//! All records are big-endian without padding.
//!
//! ```text
//! SpatialBin:   index:i64  numObs:i32  numElems:i32     numElems x f32
//! TemporalBin:             numObs:i32  numPasses:i32    numFeatures x f32
//! ```

use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{BinningError, Result};
use crate::vector::GrowableVector;

/// Index carried by bins that have not been assigned to a cell.
pub const UNSET_INDEX: i64 = -1;

/// Size of the fixed SpatialBin record header in bytes.
pub const SPATIAL_HEADER_LEN: usize = 8 + 4 + 4;

/// Size of the fixed TemporalBin record header in bytes.
pub const TEMPORAL_HEADER_LEN: usize = 4 + 4 + 4;

/// Scratch state one aggregator keeps in a bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSlot {
    pub counter: i64,
    pub samples: GrowableVector,
}

/// Per-bin named scratch storage.
///
/// Plain named values are available through [`put`](Self::put) and
/// [`get`](Self::get). Aggregators get a private [`ContextSlot`] through an
/// [`AggregatorContext`] keyed by a name that is unique within the manager.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinContext {
    values: HashMap<String, f64>,
    slots: HashMap<String, ContextSlot>,
}

impl BinContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a named value, replacing any previous one.
    pub fn put(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Named value, if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Whether a value or slot is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.slots.contains_key(name)
    }

    /// `name` if unused, otherwise the first free of `name_1`, `name_2`, ...
    pub fn ensure_unique(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }
        let mut i = 1;
        loop {
            let candidate = format!("{}_{}", name, i);
            if !self.contains(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Scoped access to the slot stored under `key`.
    pub fn scoped<'a>(&'a mut self, key: &'a str) -> AggregatorContext<'a> {
        AggregatorContext { context: self, key }
    }

    pub fn slot(&self, key: &str) -> Option<&ContextSlot> {
        self.slots.get(key)
    }

    /// Drop all values and slots.
    pub fn clear(&mut self) {
        self.values.clear();
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.slots.is_empty()
    }
}

/// An aggregator's view of a bin context, limited to its own slot.
pub struct AggregatorContext<'a> {
    context: &'a mut BinContext,
    key: &'a str,
}

impl<'a> AggregatorContext<'a> {
    pub fn key(&self) -> &str {
        self.key
    }

    fn slot_mut(&mut self) -> &mut ContextSlot {
        self.context.slots.entry(self.key.to_string()).or_default()
    }

    /// Current counter value, 0 if never touched.
    pub fn counter(&self) -> i64 {
        self.context.slots.get(self.key).map_or(0, |s| s.counter)
    }

    pub fn set_counter(&mut self, value: i64) {
        self.slot_mut().counter = value;
    }

    pub fn increment_counter(&mut self) {
        self.slot_mut().counter += 1;
    }

    /// Retained samples, empty if none were added.
    pub fn samples(&self) -> &[f32] {
        self.context
            .slots
            .get(self.key)
            .map(|s| s.samples.elements())
            .unwrap_or(&[])
    }

    /// Retained samples, creating the buffer on first use.
    pub fn samples_mut(&mut self) -> &mut GrowableVector {
        &mut self.slot_mut().samples
    }

    /// Remove the slot's samples and return them.
    pub fn take_samples(&mut self) -> GrowableVector {
        self.context
            .slots
            .get_mut(self.key)
            .map(|s| std::mem::take(&mut s.samples))
            .unwrap_or_default()
    }

    /// Reset the slot to its initial state.
    pub fn reset(&mut self) {
        self.context.slots.remove(self.key);
    }
}

/// One cell's aggregated state for a single pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBin {
    pub index: i64,
    pub num_obs: i32,
    pub feature_values: Vec<f32>,
    pub context: BinContext,
}

impl Default for SpatialBin {
    fn default() -> Self {
        Self {
            index: UNSET_INDEX,
            num_obs: 0,
            feature_values: Vec::new(),
            context: BinContext::default(),
        }
    }
}

impl SpatialBin {
    /// Create a bin for `index` with `num_features` zeroed features.
    pub fn new(index: i64, num_features: usize) -> Self {
        Self {
            index,
            num_obs: 0,
            feature_values: vec![0.0; num_features],
            context: BinContext::default(),
        }
    }

    pub fn num_features(&self) -> usize {
        self.feature_values.len()
    }

    /// Encoded record size in bytes.
    pub fn encoded_len(&self) -> usize {
        SPATIAL_HEADER_LEN + 4 * self.feature_values.len()
    }

    /// Append the record to `buf`. The context is not persisted.
    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.index);
        buf.put_i32(self.num_obs);
        buf.put_i32(self.feature_values.len() as i32);
        for &v in &self.feature_values {
            buf.put_f32(v);
        }
    }

    /// Decode the record body that follows an already consumed `index`.
    pub fn read_body<B: Buf>(index: i64, buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(BinningError::truncated(format!(
                "spatial bin {}: missing numObs, {} bytes left",
                index,
                buf.remaining()
            )));
        }
        let num_obs = buf.get_i32();
        let feature_values = read_features(buf, &format!("spatial bin {}", index))?;
        Ok(Self {
            index,
            num_obs,
            feature_values,
            context: BinContext::default(),
        })
    }

    /// Decode one full record.
    pub fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 8 {
            return Err(BinningError::truncated("spatial bin index"));
        }
        let index = buf.get_i64();
        Self::read_body(index, buf)
    }
}

impl fmt::Display for SpatialBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpatialBin{{index={}, numObs={}, featureValues={:?}}}",
            self.index, self.num_obs, self.feature_values
        )
    }
}

/// One cell's state accumulated over all passes.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBin {
    index: i64,
    pub num_obs: i32,
    pub num_passes: i32,
    pub feature_values: Vec<f32>,
    pub context: BinContext,
}

impl TemporalBin {
    /// Create a bin for cell `index`; the index must be non-negative.
    pub fn new(index: i64, num_features: usize) -> Result<Self> {
        if index < 0 {
            return Err(BinningError::InvalidBinIndex(index));
        }
        Ok(Self {
            index,
            num_obs: 0,
            num_passes: 0,
            feature_values: vec![0.0; num_features],
            context: BinContext::default(),
        })
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn num_features(&self) -> usize {
        self.feature_values.len()
    }

    /// Encoded record size in bytes.
    pub fn encoded_len(&self) -> usize {
        TEMPORAL_HEADER_LEN + 4 * self.feature_values.len()
    }

    /// Append the record to `buf`. Neither index nor context are persisted.
    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.num_obs);
        buf.put_i32(self.num_passes);
        buf.put_i32(self.feature_values.len() as i32);
        for &v in &self.feature_values {
            buf.put_f32(v);
        }
    }

    /// Decode a record; the bin carries [`UNSET_INDEX`].
    pub fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Self::read_record(UNSET_INDEX, buf)
    }

    /// Decode a record and assign it the cell `index` it was stored under.
    pub fn read_with_index<B: Buf>(index: i64, buf: &mut B) -> Result<Self> {
        if index < 0 {
            return Err(BinningError::InvalidBinIndex(index));
        }
        Self::read_record(index, buf)
    }

    fn read_record<B: Buf>(index: i64, buf: &mut B) -> Result<Self> {
        if buf.remaining() < 8 {
            return Err(BinningError::truncated(format!(
                "temporal bin header needs 8 bytes, {} left",
                buf.remaining()
            )));
        }
        let num_obs = buf.get_i32();
        let num_passes = buf.get_i32();
        let feature_values = read_features(buf, "temporal bin")?;
        Ok(Self {
            index,
            num_obs,
            num_passes,
            feature_values,
            context: BinContext::default(),
        })
    }
}

impl fmt::Display for TemporalBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemporalBin{{index={}, numObs={}, numPasses={}, featureValues={:?}}}",
            self.index, self.num_obs, self.num_passes, self.feature_values
        )
    }
}

/// Read `count:i32` followed by `count` floats.
fn read_features<B: Buf>(buf: &mut B, what: &str) -> Result<Vec<f32>> {
    if buf.remaining() < 4 {
        return Err(BinningError::truncated(format!("{}: missing feature count", what)));
    }
    let count = buf.get_i32();
    if count < 0 {
        return Err(BinningError::corrupt(format!(
            "{}: negative feature count {}",
            what, count
        )));
    }
    let count = count as usize;
    if buf.remaining() < count * 4 {
        return Err(BinningError::truncated(format!(
            "{}: expected {} features, only {} bytes left",
            what,
            count,
            buf.remaining()
        )));
    }
    Ok((0..count).map(|_| buf.get_f32()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_bin_rejects_negative_index() {
        assert!(matches!(
            TemporalBin::new(-1, 3),
            Err(BinningError::InvalidBinIndex(-1))
        ));
        assert!(TemporalBin::new(0, 3).is_ok());
    }

    #[test]
    fn test_temporal_bin_display() {
        let mut bin = TemporalBin::new(43, 3).unwrap();
        bin.num_obs = 3;
        bin.num_passes = 7;
        bin.feature_values = vec![1.2, 0.0, 2.4];
        assert_eq!(
            bin.to_string(),
            "TemporalBin{index=43, numObs=3, numPasses=7, featureValues=[1.2, 0.0, 2.4]}"
        );
    }

    #[test]
    fn test_temporal_bin_round_trip() {
        let mut bin = TemporalBin::new(61, 3).unwrap();
        bin.num_obs = 3;
        bin.num_passes = 5;
        bin.feature_values = vec![-0.4, 0.2, f32::NAN];

        let mut buf = Vec::new();
        bin.write(&mut buf);
        assert_eq!(buf.len(), bin.encoded_len());

        let read = TemporalBin::read(&mut buf.as_slice()).unwrap();
        assert_eq!(read.index(), UNSET_INDEX);
        assert_eq!(read.num_obs, 3);
        assert_eq!(read.num_passes, 5);
        assert_eq!(read.feature_values[..2], [-0.4, 0.2]);
        assert!(read.feature_values[2].is_nan());

        let read = TemporalBin::read_with_index(61, &mut buf.as_slice()).unwrap();
        assert_eq!(read.index(), 61);
    }

    #[test]
    fn test_temporal_bin_record_layout_is_big_endian() {
        let mut bin = TemporalBin::new(0, 1).unwrap();
        bin.num_obs = 1;
        bin.num_passes = 2;
        bin.feature_values = vec![1.0];
        let mut buf = Vec::new();
        bin.write(&mut buf);
        assert_eq!(
            buf,
            vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1, 0x3f, 0x80, 0, 0]
        );
    }

    #[test]
    fn test_truncated_temporal_record() {
        let mut bin = TemporalBin::new(1, 4).unwrap();
        bin.num_obs = 1;
        let mut buf = Vec::new();
        bin.write(&mut buf);
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            TemporalBin::read(&mut buf.as_slice()),
            Err(BinningError::Truncated(_))
        ));
    }

    #[test]
    fn test_negative_feature_count_is_corrupt() {
        let mut buf = Vec::new();
        buf.put_i32(1);
        buf.put_i32(1);
        buf.put_i32(-5);
        assert!(matches!(
            TemporalBin::read(&mut buf.as_slice()),
            Err(BinningError::Corrupt(_))
        ));
    }

    #[test]
    fn test_spatial_bin_round_trip() {
        let mut bin = SpatialBin::new(5_940_421, 2);
        bin.num_obs = 12;
        bin.feature_values = vec![3.5, f32::INFINITY];
        let mut buf = Vec::new();
        bin.write(&mut buf);
        assert_eq!(buf.len(), bin.encoded_len());

        let read = SpatialBin::read(&mut buf.as_slice()).unwrap();
        assert_eq!(read, bin);
    }

    #[test]
    fn test_default_spatial_bin_is_unset() {
        let bin = SpatialBin::default();
        assert_eq!(bin.index, UNSET_INDEX);
        assert_eq!(bin.num_features(), 0);
    }

    #[test]
    fn test_ensure_unique() {
        let mut ctx = BinContext::new();
        assert_eq!(ctx.ensure_unique("p90"), "p90");
        ctx.put("p90", 1.0);
        assert_eq!(ctx.ensure_unique("p90"), "p90_1");
        ctx.put("p90_1", 2.0);
        assert_eq!(ctx.ensure_unique("p90"), "p90_2");
        assert_eq!(ctx.get("p90_1"), Some(2.0));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_aggregator_context_slots_are_private() {
        let mut ctx = BinContext::new();
        {
            let mut a = ctx.scoped("a");
            a.increment_counter();
            a.increment_counter();
            a.samples_mut().add(1.5);
        }
        {
            let b = ctx.scoped("b");
            assert_eq!(b.counter(), 0);
            assert!(b.samples().is_empty());
        }
        let mut a = ctx.scoped("a");
        assert_eq!(a.counter(), 2);
        assert_eq!(a.samples(), &[1.5]);
        let taken = a.take_samples();
        assert_eq!(taken.size(), 1);
        assert!(a.samples().is_empty());
        a.reset();
        assert_eq!(a.counter(), 0);
    }
}
