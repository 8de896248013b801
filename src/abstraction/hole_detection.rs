//! Computation of the feasible regions and holes of a group of plants.
//!
//! Each plant contributes one of several power ranges (e.g. zero or its technical bounds). The
//! reachable sums over all combinations are merged into disjoint regions and the gaps between them
//! are the holes.
use crate::interval::{FeasibleRegions, Interval, SupplyRegions};
use anyhow::Result;
use itertools::iproduct;

/// Insert an interval into a sorted list of disjoint intervals, merging any that it touches
pub fn merge_in(regions: &mut Vec<Interval<f64>>, interval: Interval<f64>) {
    let start = regions.partition_point(|region| region.max < interval.min);
    if start == regions.len() || regions[start].min > interval.max {
        regions.insert(start, interval);
        return;
    }

    let end = start + regions[start..].partition_point(|region| region.min <= interval.max);
    let merged = Interval {
        min: regions[start].min.min(interval.min),
        max: regions[end - 1].max.max(interval.max),
    };
    regions.splice(start..end, [merged]);
}

/// All sums of a range from `regions` with a range from `options`, merged into disjoint intervals
pub fn plus_sets(regions: &[Interval<f64>], options: &[Interval<f64>]) -> Vec<Interval<f64>> {
    let mut sums = Vec::new();
    for (region, option) in iproduct!(regions, options) {
        merge_in(&mut sums, *region + *option);
    }

    sums
}

/// Compute the feasible regions and holes for plants contributing the given ranges.
///
/// A plant with no ranges is treated as contributing exactly zero. If there are no plants, the
/// result is empty.
pub fn detect_supply_holes(plant_options: &[Vec<Interval<f64>>]) -> Result<SupplyRegions> {
    let zero = [Interval::point(0.0)];
    let mut iter = plant_options.iter().map(|options| {
        if options.is_empty() {
            zero.as_slice()
        } else {
            options.as_slice()
        }
    });

    let Some(first) = iter.next() else {
        return Ok(SupplyRegions::default());
    };
    let mut regions = Vec::new();
    for option in first {
        merge_in(&mut regions, *option);
    }
    for options in iter {
        regions = plus_sets(&regions, options);
    }

    let feasible_regions = FeasibleRegions::from_intervals(regions)?;
    Ok(SupplyRegions::from_regions(feasible_regions))
}
