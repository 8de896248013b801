//! Piecewise linear functions, as used for the delta and cost functions of aggregates.
//!
//! A function is given by `n` breakpoints `t`, `n + 1` slopes `s` and an anchor `(t0, v0)` with
//! `f(t0) = v0`. Slope `s[0]` applies below the first breakpoint, `s[i]` between `t[i - 1]` and
//! `t[i]` and `s[n]` above the last breakpoint. The values at the breakpoints are cached for
//! evaluation and refreshed whenever the slopes or anchor change.
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::cmp::Ordering;

/// Slopes and input differences smaller than this are treated as zero
const SLOPE_TOLERANCE: f64 = 1e-5;

/// A sampled input along with the corresponding output.
///
/// Pairs are compared and ordered by their input alone.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InOutPair {
    /// Value fed into the model
    pub input: f64,
    /// Resulting value of the decision expression
    pub output: f64,
}

impl InOutPair {
    /// Create a new [`InOutPair`]
    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

impl PartialEq for InOutPair {
    fn eq(&self, other: &Self) -> bool {
        self.input.total_cmp(&other.input).is_eq()
    }
}

impl Eq for InOutPair {}

impl PartialOrd for InOutPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InOutPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.input.total_cmp(&other.input)
    }
}

/// Variable names used when exporting a function
#[derive(Debug, Clone)]
pub struct ExportNames<'a> {
    /// Number of breakpoints
    pub n: &'a str,
    /// Anchor input
    pub first_in: &'a str,
    /// Anchor output
    pub f_at_first: &'a str,
    /// Breakpoint array
    pub breakpoint: &'a str,
    /// Slope array
    pub slope: &'a str,
}

impl Default for ExportNames<'_> {
    fn default() -> Self {
        Self {
            n: "n",
            first_in: "firstIn",
            f_at_first: "fAtFirst",
            breakpoint: "breakpoint",
            slope: "slope",
        }
    }
}

/// A piecewise linear function of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearFunction {
    breakpoints: Vec<f64>,
    slopes: Vec<f64>,
    values: Vec<f64>,
    anchor_input: f64,
    anchor_output: f64,
    samples: Vec<InOutPair>,
}

impl PiecewiseLinearFunction {
    /// Fit a function through the points `(inputs[i], outputs[i])`.
    ///
    /// The inputs must be strictly increasing and there must be at least two points. The function
    /// is constant below the first and above the last input.
    pub fn convert(inputs: &[f64], outputs: &[f64]) -> Result<Self> {
        ensure!(
            inputs.len() == outputs.len(),
            "Got {} inputs but {} outputs",
            inputs.len(),
            outputs.len()
        );
        let n = inputs.len();
        ensure!(
            n >= 2,
            "At least two points are needed for a piecewise linear function"
        );

        let mut slopes = vec![0.0; n + 1];
        for i in 1..n {
            let run = inputs[i] - inputs[i - 1];
            ensure!(
                run > 0.0,
                "Inputs must be strictly increasing, but {} is followed by {}",
                inputs[i - 1],
                inputs[i]
            );

            let slope = (outputs[i] - outputs[i - 1]) / run;
            if run >= SLOPE_TOLERANCE && slope.abs() >= SLOPE_TOLERANCE {
                slopes[i] = slope;
            }
        }

        let mut function = Self {
            breakpoints: inputs.to_vec(),
            slopes,
            values: Vec::new(),
            anchor_input: inputs[0],
            anchor_output: outputs[0],
            samples: inputs
                .iter()
                .zip(outputs)
                .map(|(&input, &output)| InOutPair::new(input, output))
                .collect(),
        };
        function.update_for_evaluation();

        Ok(function)
    }

    /// Fit a function through sampled pairs, which must be sorted by input
    pub fn from_pairs(pairs: &[InOutPair]) -> Result<Self> {
        let (inputs, outputs): (Vec<_>, Vec<_>) =
            pairs.iter().map(|pair| (pair.input, pair.output)).unzip();
        Self::convert(&inputs, &outputs)
    }

    /// The linear function `f(x) = k * x`, with breakpoints at `min` and `max`
    pub fn from_linear_function(min: f64, max: f64, k: f64) -> Result<Self> {
        ensure!(
            min < max,
            "Invalid domain for linear function: [{min} {max}]"
        );

        let mut function = Self {
            breakpoints: vec![min, max],
            slopes: vec![k; 3],
            values: Vec::new(),
            anchor_input: min,
            anchor_output: k * min,
            samples: Vec::new(),
        };
        function.update_for_evaluation();

        Ok(function)
    }

    /// Recompute the cached value at each breakpoint from the anchor, slopes and breakpoints.
    ///
    /// Values are accumulated outwards from the breakpoint segment containing the anchor.
    fn update_for_evaluation(&mut self) {
        let t = &self.breakpoints;
        let s = &self.slopes;
        let (t0, v0) = (self.anchor_input, self.anchor_output);
        let n = t.len();

        let mut f = vec![0.0; n];
        let start = match t.iter().position(|&breakpoint| t0 <= breakpoint) {
            Some(0) => {
                f[0] = v0 + (t[0] - t0) * s[0];
                0
            }
            Some(above) => {
                let below = above - 1;
                f[below] = v0 - (t0 - t[below]) * s[above];
                below
            }
            None => {
                let last = n - 1;
                f[last] = v0 - (t0 - t[last]) * s[n];
                last
            }
        };

        for i in start + 1..n {
            f[i] = f[i - 1] + (t[i] - t[i - 1]) * s[i];
        }
        for i in (0..start).rev() {
            f[i] = f[i + 1] - (t[i + 1] - t[i]) * s[i + 1];
        }

        self.values = f;
    }

    /// Evaluate the function at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        let t = &self.breakpoints;
        let s = &self.slopes;
        let f = &self.values;

        match t.iter().position(|&breakpoint| breakpoint > x) {
            None => {
                let last = t.len() - 1;
                f[last] + s[last + 1] * (x - t[last])
            }
            Some(0) => f[0] - s[0] * (t[0] - x),
            Some(above) => {
                let below = above - 1;
                f[below] + s[above] * (x - t[below])
            }
        }
    }

    /// The cached value at breakpoint `index`
    pub fn evaluate_breakpoint(&self, index: usize) -> Result<f64> {
        self.values.get(index).copied().with_context(|| {
            format!(
                "Breakpoint index {index} out of range for function with {} breakpoints",
                self.len()
            )
        })
    }

    /// Extend the outermost interior slopes to infinity in both directions.
    ///
    /// Has no effect unless there is at least one interior slope.
    pub fn prolong_ad_infinitum(&mut self) {
        let n = self.slopes.len();
        if n < 3 {
            return;
        }

        self.slopes[0] = self.slopes[1];
        self.slopes[n - 1] = self.slopes[n - 2];
        self.update_for_evaluation();
    }

    /// Divide the slopes and anchor output by `divisor`, e.g. to convert between units
    pub fn divide_slopes_by(&mut self, divisor: f64) -> Result<()> {
        ensure!(divisor != 0.0, "Cannot divide slopes by zero");
        self.multiply_slopes_with(divisor.recip());
        Ok(())
    }

    /// Multiply the slopes and anchor output by `factor`
    pub fn multiply_slopes_with(&mut self, factor: f64) {
        self.anchor_output *= factor;
        for slope in &mut self.slopes {
            *slope *= factor;
        }
        self.update_for_evaluation();
    }

    /// The number of breakpoints
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether the function has no breakpoints
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// The breakpoints
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// The slopes, one more than there are breakpoints
    pub fn slopes(&self) -> &[f64] {
        &self.slopes
    }

    /// The anchor input
    pub fn first_input(&self) -> f64 {
        self.anchor_input
    }

    /// The value at the anchor input
    pub fn first_output(&self) -> f64 {
        self.anchor_output
    }

    /// The samples the function was fitted through (empty for linear functions)
    pub fn samples(&self) -> &[InOutPair] {
        &self.samples
    }

    /// The largest slope
    pub fn max_slope(&self) -> f64 {
        self.slopes.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// The breakpoints padded with zeros (or truncated) to `max_breakpoints` entries
    pub fn padded_breakpoints(&self, max_breakpoints: usize) -> Vec<f64> {
        let mut breakpoints = self.breakpoints.clone();
        breakpoints.resize(max_breakpoints, 0.0);
        breakpoints
    }

    /// The slopes padded with zeros (or truncated) to `max_breakpoints + 1` entries
    pub fn padded_slopes(&self, max_breakpoints: usize) -> Vec<f64> {
        let mut slopes = self.slopes.clone();
        slopes.resize(max_breakpoints + 1, 0.0);
        slopes
    }

    /// Render the function as variable assignments using the default names
    pub fn to_export_string(&self) -> String {
        self.to_export_string_with_names(&ExportNames::default())
    }

    /// Render the function as variable assignments, e.g. `n=2;` followed by the anchor, breakpoint
    /// and slope definitions
    pub fn to_export_string_with_names(&self, names: &ExportNames) -> String {
        format!(
            "{}={};\n{}={:?};\n{}={:?};\n{}={};\n{}={};\n",
            names.n,
            self.len(),
            names.first_in,
            self.anchor_input,
            names.f_at_first,
            self.anchor_output,
            names.breakpoint,
            format_array(&self.breakpoints),
            names.slope,
            format_array(&self.slopes)
        )
    }

    /// The samples as `input;output` lines
    pub fn samples_csv(&self) -> String {
        self.samples
            .iter()
            .map(|pair| format!("{:?};{:?}\n", pair.input, pair.output))
            .collect()
    }
}

/// Format values as `[a, b, c]`
fn format_array(values: &[f64]) -> String {
    let values: Vec<_> = values.iter().map(|value| format!("{value:?}")).collect();
    format!("[{}]", values.join(", "))
}
