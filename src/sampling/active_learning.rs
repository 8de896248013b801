//! A selector which delegates the choice of inputs to an external active learning oracle.
//!
//! The oracle is reached through an [`OracleTransport`], one synchronous request at a time. A
//! failed call is logged and treated as a safe default (no more inputs), so that sampling ends
//! rather than stalling. An oracle which stops answering counts as a failed call once the
//! transport's read timeout has passed.
use super::selector::SamplingPointSelector;
use crate::interval::SupplyRegions;
use crate::pwl::InOutPair;
use anyhow::{Context, Result, ensure};
use log::error;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// How long to wait for the oracle to answer a call
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A call to the oracle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OracleRequest {
    /// Start learning a new function with the given sample budget
    Reset {
        /// Maximum number of samples
        budget: usize,
    },
    /// Samples taken before selection started
    SetInitialPoints {
        /// Sampled inputs
        inputs: Vec<f64>,
        /// Corresponding outputs
        outputs: Vec<f64>,
    },
    /// The general feasible regions of the aggregate
    SetFeasibleRegions {
        /// Lower bound of each region
        lower_bounds: Vec<f64>,
        /// Upper bound of each region
        upper_bounds: Vec<f64>,
    },
    /// A successfully sampled pair
    Inform {
        /// Sampled input
        input: f64,
        /// Corresponding output
        output: f64,
    },
    /// An input for which no solution was found
    InformFailure {
        /// The failed input
        input: f64,
    },
    /// Ask whether there is another input to sample
    HasNextInput,
    /// Ask for the next input
    GetNextInput,
}

/// The oracle's answer to a call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OracleResponse {
    /// Answer to [`OracleRequest::HasNextInput`]
    Bool(bool),
    /// Answer to [`OracleRequest::GetNextInput`]
    Number(f64),
    /// Acknowledgement of a notification
    Ack,
}

/// A synchronous request/response channel to an oracle
pub trait OracleTransport {
    /// Send a request and wait for the response
    fn call(&mut self, request: &OracleRequest) -> Result<OracleResponse>;
}

/// Talks to an oracle over TCP, with one JSON document per line in each direction
pub struct TcpOracleTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpOracleTransport {
    /// Connect to an oracle listening at `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_ORACLE_TIMEOUT)
    }

    /// Connect to an oracle, giving up on a call if no response arrives within `timeout`
    pub fn connect_with_timeout<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self> {
        ensure!(!timeout.is_zero(), "Oracle timeout must be greater than zero");
        let writer = TcpStream::connect(addr).context("Could not connect to oracle")?;
        writer.set_read_timeout(Some(timeout))?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }
}

impl OracleTransport for TcpOracleTransport {
    fn call(&mut self, request: &OracleRequest) -> Result<OracleResponse> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut response = String::new();
        let read = self
            .reader
            .read_line(&mut response)
            .context("No response from oracle")?;
        ensure!(read > 0, "Oracle closed the connection");
        serde_json::from_str(response.trim())
            .with_context(|| format!("Invalid response from oracle: {}", response.trim()))
    }
}

/// Selects inputs by asking an active learning oracle
pub struct ActiveLearningSelector<T: OracleTransport> {
    transport: T,
    budget: usize,
}

impl<T: OracleTransport> ActiveLearningSelector<T> {
    /// Create a selector which allows the oracle up to `budget` samples per function
    pub fn new(transport: T, budget: usize) -> Self {
        Self { transport, budget }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make a call, logging any failure
    fn call(&mut self, request: &OracleRequest) -> Option<OracleResponse> {
        match self.transport.call(request) {
            Ok(response) => Some(response),
            Err(err) => {
                error!("Oracle call {request:?} failed: {err:#}");
                None
            }
        }
    }
}

impl<T: OracleTransport> SamplingPointSelector for ActiveLearningSelector<T> {
    fn has_next(&mut self) -> bool {
        match self.call(&OracleRequest::HasNextInput) {
            Some(OracleResponse::Bool(has_next)) => has_next,
            Some(response) => {
                error!("Unexpected oracle response to has_next_input: {response:?}");
                false
            }
            None => false,
        }
    }

    fn next_input(&mut self) -> Option<f64> {
        match self.call(&OracleRequest::GetNextInput)? {
            OracleResponse::Number(input) => Some(input),
            response => {
                error!("Unexpected oracle response to get_next_input: {response:?}");
                None
            }
        }
    }

    fn inform(&mut self, pair: InOutPair) {
        self.call(&OracleRequest::Inform {
            input: pair.input,
            output: pair.output,
        });
    }

    fn inform_failure(&mut self, input: f64) {
        self.call(&OracleRequest::InformFailure { input });
    }

    fn reset(&mut self) {
        self.call(&OracleRequest::Reset {
            budget: self.budget,
        });
    }

    fn set_initial_points(&mut self, pairs: &[InOutPair]) {
        let (inputs, outputs) = pairs.iter().map(|pair| (pair.input, pair.output)).unzip();
        self.call(&OracleRequest::SetInitialPoints { inputs, outputs });
    }

    fn set_abstraction_data(&mut self, supply: &SupplyRegions) {
        let (lower_bounds, upper_bounds) = supply
            .feasible_regions
            .iter()
            .map(|region| (region.min, region.max))
            .unzip();
        self.call(&OracleRequest::SetFeasibleRegions {
            lower_bounds,
            upper_bounds,
        });
    }
}
