//! Closed intervals and the sorted, non-overlapping containers built from them.
//!
//! Intervals are ordered by their lower bound. Two intervals sharing a lower bound must be identical,
//! otherwise they overlap and the comparison fails.
use anyhow::{Result, bail, ensure};
use derive_more::Add;
use float_cmp::approx_eq;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// A closed range `[min, max]`.
///
/// A degenerate interval (`min == max`) represents a known point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Add, Serialize)]
pub struct Interval<T> {
    /// Lower bound (inclusive)
    pub min: T,
    /// Upper bound (inclusive)
    pub max: T,
}

impl<T: PartialOrd + Copy + fmt::Display> Interval<T> {
    /// Create a new [`Interval`].
    ///
    /// # Panics
    ///
    /// If `min > max`. Use [`Interval::try_new`] for untrusted values.
    pub fn new(min: T, max: T) -> Self {
        assert!(min <= max, "Invalid interval: [{min} {max}]");
        Self { min, max }
    }

    /// Create a new [`Interval`], checking that the bounds are in order
    pub fn try_new(min: T, max: T) -> Result<Self> {
        ensure!(min <= max, "Invalid interval: [{min} {max}]");
        Ok(Self { min, max })
    }

    /// Create a degenerate interval representing a single value
    pub fn point(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Whether `value` lies within the interval
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// Compare two intervals by their lower bound.
    ///
    /// Fails if the lower bounds are equal but the upper bounds differ, as such intervals overlap.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        match self.min.partial_cmp(&other.min) {
            Some(Ordering::Equal) => {
                ensure!(
                    self.max == other.max,
                    "Overlapping intervals detected: {self} and {other}"
                );
                Ok(Ordering::Equal)
            }
            Some(ordering) => Ok(ordering),
            None => bail!("Intervals {self} and {other} cannot be compared"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.min, self.max)
    }
}

/// A sorted set of non-overlapping power ranges which can be supplied
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeasibleRegions(Vec<Interval<f64>>);

impl FeasibleRegions {
    /// Create an empty set of regions
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set of regions from intervals given in any order
    pub fn from_intervals<I>(intervals: I) -> Result<Self>
    where
        I: IntoIterator<Item = Interval<f64>>,
    {
        let mut regions = Self::new();
        for interval in intervals {
            regions.insert(interval)?;
        }

        Ok(regions)
    }

    /// Insert an interval, keeping the regions sorted.
    ///
    /// Returns `false` if an identical interval was already present. Fails if the interval overlaps
    /// with an existing region.
    pub fn insert(&mut self, interval: Interval<f64>) -> Result<bool> {
        let mut index = self.0.len();
        for (i, existing) in self.0.iter().enumerate() {
            match interval.try_cmp(existing)? {
                Ordering::Equal => return Ok(false),
                Ordering::Less => {
                    index = i;
                    break;
                }
                Ordering::Greater => {}
            }
        }

        if let Some(previous) = index.checked_sub(1).map(|i| &self.0[i]) {
            ensure!(
                previous.max < interval.min,
                "Overlapping intervals detected: {previous} and {interval}"
            );
        }
        if let Some(next) = self.0.get(index) {
            ensure!(
                interval.max < next.min,
                "Overlapping intervals detected: {interval} and {next}"
            );
        }

        self.0.insert(index, interval);
        Ok(true)
    }

    /// Iterate over the regions in ascending order
    pub fn iter(&self) -> std::slice::Iter<'_, Interval<f64>> {
        self.0.iter()
    }

    /// The regions as a sorted slice
    pub fn as_slice(&self) -> &[Interval<f64>] {
        &self.0
    }

    /// The number of regions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no regions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The lowest region
    pub fn first(&self) -> Option<&Interval<f64>> {
        self.0.first()
    }

    /// The highest region
    pub fn last(&self) -> Option<&Interval<f64>> {
        self.0.last()
    }

    /// The range from the lowest to the highest supplyable value
    pub fn span(&self) -> Option<Interval<f64>> {
        Some(Interval {
            min: self.first()?.min,
            max: self.last()?.max,
        })
    }

    /// Whether `value` lies within any region
    pub fn contains_value(&self, value: f64) -> bool {
        self.0.iter().any(|region| region.contains(value))
    }

    /// The gaps between consecutive regions
    pub fn holes(&self) -> Vec<Interval<f64>> {
        self.0
            .windows(2)
            .map(|pair| Interval {
                min: pair[0].max,
                max: pair[1].min,
            })
            .collect()
    }

    /// Whether both sets contain the same number of regions with bounds equal within `epsilon`
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| {
                approx_eq!(f64, a.min, b.min, epsilon = epsilon)
                    && approx_eq!(f64, a.max, b.max, epsilon = epsilon)
            })
    }

    /// Widen the region closest to `value` so that it includes `value`.
    ///
    /// Returns `true` if a region was widened. Nothing changes if `value` is already supplyable or
    /// there are no regions.
    pub fn make_consistent(&mut self, value: f64) -> bool {
        if self.contains_value(value) {
            return false;
        }

        let distance = |region: &Interval<f64>| {
            if value < region.min {
                region.min - value
            } else {
                value - region.max
            }
        };
        let Some(index) = self
            .0
            .iter()
            .map(distance)
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index)
        else {
            return false;
        };

        let closest = &mut self.0[index];
        if closest.min > value {
            closest.min = value;
        } else {
            closest.max = value;
        }

        true
    }
}

impl<'a> IntoIterator for &'a FeasibleRegions {
    type Item = &'a Interval<f64>;
    type IntoIter = std::slice::Iter<'a, Interval<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The feasible regions of a plant group at one instant, along with the holes between them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplyRegions {
    /// Power ranges which can be jointly supplied
    pub feasible_regions: FeasibleRegions,
    /// Power ranges lying between feasible regions which cannot be supplied
    pub holes: Vec<Interval<f64>>,
}

impl SupplyRegions {
    /// Create from a set of feasible regions, deriving the holes
    pub fn from_regions(feasible_regions: FeasibleRegions) -> Self {
        let holes = feasible_regions.holes();
        Self {
            feasible_regions,
            holes,
        }
    }
}

/// Feasible regions and holes for each step of a planning horizon.
///
/// Index 0 is the first planned step, not the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet(Vec<SupplyRegions>);

impl IntervalSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the regions for the next step
    pub fn push(&mut self, regions: SupplyRegions) {
        self.0.push(regions);
    }

    /// The regions for the given step index
    pub fn get(&self, step: usize) -> Option<&SupplyRegions> {
        self.0.get(step)
    }

    /// The regions for the final step
    pub fn last(&self) -> Option<&SupplyRegions> {
        self.0.last()
    }

    /// The number of steps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no steps have been recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the steps in order
    pub fn iter(&self) -> std::slice::Iter<'_, SupplyRegions> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    fn regions(bounds: &[(f64, f64)]) -> FeasibleRegions {
        FeasibleRegions::from_intervals(bounds.iter().map(|&(min, max)| Interval::new(min, max)))
            .unwrap()
    }

    #[test]
    fn test_interval_try_new() {
        assert!(Interval::try_new(1.0, 2.0).is_ok());
        assert!(Interval::try_new(2.0, 2.0).is_ok());
        assert_error!(Interval::try_new(3.0, 2.0), "Invalid interval: [3 2]");
    }

    #[rstest]
    #[case(Interval::new(1, 2), Interval::new(3, 4), Ordering::Less)]
    #[case(Interval::new(3, 4), Interval::new(1, 2), Ordering::Greater)]
    #[case(Interval::new(1, 2), Interval::new(1, 2), Ordering::Equal)]
    fn test_interval_try_cmp(
        #[case] a: Interval<i32>,
        #[case] b: Interval<i32>,
        #[case] expected: Ordering,
    ) {
        assert_eq!(a.try_cmp(&b).unwrap(), expected);
    }

    #[test]
    fn test_interval_try_cmp_overlap() {
        assert_error!(
            Interval::new(1, 2).try_cmp(&Interval::new(1, 3)),
            "Overlapping intervals detected: [1 2] and [1 3]"
        );
    }

    #[test]
    fn test_interval_add() {
        assert_eq!(
            Interval::new(50.0, 100.0) + Interval::new(15.0, 35.0),
            Interval::new(65.0, 135.0)
        );
    }

    #[test]
    fn test_feasible_regions_insert_sorted() {
        let mut regions = FeasibleRegions::new();
        assert!(regions.insert(Interval::new(10.0, 20.0)).unwrap());
        assert!(regions.insert(Interval::point(0.0)).unwrap());
        assert!(regions.insert(Interval::new(30.0, 40.0)).unwrap());
        assert!(!regions.insert(Interval::new(10.0, 20.0)).unwrap());

        assert_eq!(
            regions.as_slice(),
            [
                Interval::point(0.0),
                Interval::new(10.0, 20.0),
                Interval::new(30.0, 40.0)
            ]
        );
    }

    #[test]
    fn test_feasible_regions_insert_equal_min() {
        let mut regions = regions(&[(10.0, 20.0)]);
        assert!(regions.insert(Interval::new(10.0, 25.0)).is_err());
        assert_eq!(regions.len(), 1);
    }

    #[rstest]
    #[case(Interval::new(15.0, 25.0))]
    #[case(Interval::new(5.0, 10.0))]
    #[case(Interval::new(0.0, 50.0))]
    fn test_feasible_regions_insert_overlap(#[case] interval: Interval<f64>) {
        let mut regions = regions(&[(10.0, 20.0)]);
        assert!(regions.insert(interval).is_err());
    }

    #[test]
    fn test_feasible_regions_holes() {
        let regions = regions(&[(0.0, 0.0), (15.0, 35.0), (50.0, 135.0)]);
        assert_eq!(
            regions.holes(),
            [Interval::new(0.0, 15.0), Interval::new(35.0, 50.0)]
        );
        assert_eq!(regions.span(), Some(Interval::new(0.0, 135.0)));
    }

    #[rstest]
    #[case(12.0, false, &[(0.0, 0.0), (10.0, 20.0), (30.0, 40.0)])]
    #[case(22.0, true, &[(0.0, 0.0), (10.0, 22.0), (30.0, 40.0)])]
    #[case(28.0, true, &[(0.0, 0.0), (10.0, 20.0), (28.0, 40.0)])]
    #[case(45.0, true, &[(0.0, 0.0), (10.0, 20.0), (30.0, 45.0)])]
    #[case(-5.0, true, &[(-5.0, 0.0), (10.0, 20.0), (30.0, 40.0)])]
    fn test_make_consistent(
        #[case] value: f64,
        #[case] changed: bool,
        #[case] expected: &[(f64, f64)],
    ) {
        let mut actual = regions(&[(0.0, 0.0), (10.0, 20.0), (30.0, 40.0)]);
        assert_eq!(actual.make_consistent(value), changed);
        assert_eq!(actual, regions(expected));
        assert!(actual.contains_value(value));
    }

    #[test]
    fn test_make_consistent_empty() {
        let mut regions = FeasibleRegions::new();
        assert!(!regions.make_consistent(1.0));
        assert!(regions.is_empty());
    }

    #[test]
    fn test_approx_eq() {
        let a = regions(&[(0.0, 0.0), (10.0, 20.0)]);
        let b = regions(&[(0.0, 0.05), (10.05, 20.0)]);
        assert!(a.approx_eq(&b, 0.1));
        assert!(!a.approx_eq(&b, 0.01));
        assert!(!a.approx_eq(&regions(&[(0.0, 0.0)]), 0.1));
    }
}
