//! Strategies for choosing the next input to sample.
use super::SampledPairs;
use crate::interval::SupplyRegions;
use crate::pwl::InOutPair;

/// Chooses the inputs at which the model of an aggregate is sampled
pub trait SamplingPointSelector {
    /// Whether there is another input to sample
    fn has_next(&mut self) -> bool;

    /// The next input to sample, if any
    fn next_input(&mut self) -> Option<f64>;

    /// Record a successfully sampled pair
    fn inform(&mut self, pair: InOutPair);

    /// Record that no solution was found for `input`
    fn inform_failure(&mut self, input: f64);

    /// Prepare for sampling a new function
    fn reset(&mut self);

    /// Record pairs which were sampled before selection started
    fn set_initial_points(&mut self, pairs: &[InOutPair]);

    /// Provide the general feasible regions and holes of the aggregate being sampled
    fn set_abstraction_data(&mut self, _supply: &SupplyRegions) {}
}

/// Walks through a fixed list of inputs in order, skipping any which have already been sampled.
///
/// Inputs are matched against sampled pairs by value only.
#[derive(Debug, Clone)]
pub struct EquidistantSelector {
    points: Vec<f64>,
    index: usize,
    sampled: SampledPairs,
}

impl EquidistantSelector {
    /// Create a selector for the given inputs
    pub fn new(points: Vec<f64>) -> Self {
        Self {
            points,
            index: 0,
            sampled: SampledPairs::new(),
        }
    }

    /// The inputs the selector walks through
    pub fn points(&self) -> &[f64] {
        &self.points
    }
}

impl SamplingPointSelector for EquidistantSelector {
    fn has_next(&mut self) -> bool {
        while self
            .points
            .get(self.index)
            .is_some_and(|&input| self.sampled.contains_input(input))
        {
            self.index += 1;
        }

        self.index < self.points.len()
    }

    fn next_input(&mut self) -> Option<f64> {
        let input = self.points.get(self.index).copied()?;
        self.index += 1;
        Some(input)
    }

    fn inform(&mut self, pair: InOutPair) {
        self.sampled.insert(pair);
    }

    fn inform_failure(&mut self, _input: f64) {}

    fn reset(&mut self) {
        self.index = 0;
        self.sampled = SampledPairs::new();
    }

    fn set_initial_points(&mut self, pairs: &[InOutPair]) {
        self.sampled = pairs.iter().copied().collect();
    }
}
