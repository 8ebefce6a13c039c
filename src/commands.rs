//! The harness commands: set, get, bulk get and the stress burst.
//!
//! Each command builds its request(s), sends them through [`invoke`] with a
//! fixed budget and returns a report for the operator. Set, get and bulk get
//! stop at the first error; the burst records failures and keeps going.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::decode::decode;
use crate::error::{HarnessError, Result};
use crate::invoker::{invoke, BURST_DEADLINE, INTERACTIVE_DEADLINE};
use crate::storage::Storage;
use crate::{BulkGetRequest, GetRequest, GetResponse, Metadata, SetRequest, Value};

/// Static description of the request types, shown by menu choice 4.
pub const SCHEMA: &str = "\
Proto Schema:
SetRequest:
  - Key: string
  - Value: (string/int)
  - Metadata: map[string]string
GetRequest:
  - Key: string
BulkGetRequest:
  - Requests: []GetRequest";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    Set,
    Get,
    BulkGet,
    Schema,
    StressTest,
    Exit,
}

impl MenuChoice {
    pub const MENU: &'static str = "\
Select Operation:
1. Set
2. Get
3. BulkGet
4. Display Schema
5. Stress Test (Batch Requests)
0. Exit";

    pub fn parse(input: &str) -> Option<MenuChoice> {
        match input.trim() {
            "1" => Some(MenuChoice::Set),
            "2" => Some(MenuChoice::Get),
            "3" => Some(MenuChoice::BulkGet),
            "4" => Some(MenuChoice::Schema),
            "5" => Some(MenuChoice::StressTest),
            "0" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Split a comma-separated key line. Segments are trimmed and empty ones are
/// kept as empty keys so positions line up with what the operator typed.
pub fn parse_keys(line: &str) -> Vec<String> {
    line.trim().split(',').map(|k| k.trim().to_string()).collect()
}

/// Parse a burst size. Must be a positive integer.
pub fn parse_count(input: &str) -> Result<usize> {
    let input = input.trim();
    match input.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n)
            .map_err(|_| HarnessError::InvalidInput(format!("{} is too large", n))),
        _ => Err(HarnessError::InvalidInput(format!(
            "expected a positive number of requests, got {:?}",
            input
        ))),
    }
}

#[derive(Debug)]
pub struct SetReport {
    pub success: bool,
    pub latency: Duration,
}

impl fmt::Display for SetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Set Response: Success={}, Latency={:?}",
            self.success, self.latency
        )
    }
}

/// A decoded get answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub value: String,
    pub metadata: Metadata,
}

impl From<GetResponse> for Decoded {
    fn from(resp: GetResponse) -> Self {
        Decoded {
            value: decode(&resp),
            metadata: resp.metadata,
        }
    }
}

#[derive(Debug)]
pub struct GetReport {
    pub entry: Decoded,
    pub latency: Duration,
}

impl fmt::Display for GetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Get Response: Value={}, Metadata={}, Latency={:?}",
            self.entry.value, self.entry.metadata, self.latency
        )
    }
}

/// `entries[i]` answers the i-th key sent.
#[derive(Debug)]
pub struct BulkGetReport {
    pub entries: Vec<Decoded>,
    pub latency: Duration,
}

impl fmt::Display for BulkGetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BulkGet Response:")?;
        for entry in &self.entries {
            writeln!(f, "- Value={}, Metadata={}", entry.value, entry.metadata)?;
        }
        write!(f, "Latency: {:?}", self.latency)
    }
}

/// Latency over the successful calls of a burst.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: usize,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl LatencyStats {
    pub fn record(&mut self, sample: Duration) {
        self.count += 1;
        self.total += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
    }

    pub fn mean(&self) -> Option<Duration> {
        u32::try_from(self.count)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.total / n)
    }
}

#[derive(Debug)]
pub struct BurstFailure {
    pub index: usize,
    pub error: HarnessError,
}

/// Accounting for one stress run. `failures.len() <= total` always.
#[derive(Debug)]
pub struct BurstResult {
    pub total: usize,
    pub failures: Vec<BurstFailure>,
    pub latency: LatencyStats,
    pub elapsed: Duration,
}

impl BurstResult {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn timeouts(&self) -> usize {
        self.failures.iter().filter(|f| f.error.is_timeout()).count()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

impl fmt::Display for BurstResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stress test completed: {} requests, Total Latency={:?}",
            self.total, self.elapsed
        )?;
        if !self.failures.is_empty() {
            write!(
                f,
                ", Failures={} ({} timed out)",
                self.failure_count(),
                self.timeouts()
            )?;
        }
        if let (Some(min), Some(mean), Some(max)) =
            (self.latency.min, self.latency.mean(), self.latency.max)
        {
            write!(f, ", min/mean/max={:?}/{:?}/{:?}", min, mean, max)?;
        }
        Ok(())
    }
}

/// Owns the channel for the lifetime of the interactive loop.
pub struct Session<S> {
    storage: S,
}

impl<S: Storage> Session<S> {
    pub fn new(storage: S) -> Self {
        Session { storage }
    }

    /// Close the session, handing back the channel.
    pub fn close(self) -> S {
        self.storage
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<SetReport> {
        let req = SetRequest {
            key: key.trim().to_string(),
            value: Value::Text(value.trim().to_string()),
            metadata: Some(Metadata::tag("tag1", "example-tag")),
        };
        let timed = invoke(INTERACTIVE_DEADLINE, |ctx| self.storage.set(ctx, req)).await;
        let resp = timed.outcome?;
        Ok(SetReport {
            success: resp.success,
            latency: timed.elapsed,
        })
    }

    pub async fn get(&self, key: &str) -> Result<GetReport> {
        let req = GetRequest {
            key: key.trim().to_string(),
        };
        let timed = invoke(INTERACTIVE_DEADLINE, |ctx| self.storage.get(ctx, req)).await;
        let resp = timed.outcome?;
        Ok(GetReport {
            entry: resp.into(),
            latency: timed.elapsed,
        })
    }

    /// One call for the whole batch, under a single budget.
    pub async fn bulk_get(&self, keys: Vec<String>) -> Result<BulkGetReport> {
        let expected = keys.len();
        let req = BulkGetRequest {
            requests: keys.into_iter().map(|key| GetRequest { key }).collect(),
        };
        let timed = invoke(INTERACTIVE_DEADLINE, |ctx| self.storage.bulk_get(ctx, req)).await;
        let resp = timed.outcome?;
        if resp.responses.len() != expected {
            return Err(HarnessError::BatchMismatch {
                expected,
                actual: resp.responses.len(),
            });
        }
        Ok(BulkGetReport {
            entries: resp.responses.into_iter().map(Decoded::from).collect(),
            latency: timed.elapsed,
        })
    }

    /// Parse the operator's count and run the burst. Bad input sends nothing.
    pub async fn stress_test(&self, input: &str) -> Result<BurstResult> {
        let count = parse_count(input)?;
        Ok(self.stress(count).await)
    }

    /// Issue `count` writes one after another, each under its own budget.
    pub async fn stress(&self, count: usize) -> BurstResult {
        info!("performing stress test with {} requests", count);
        let started = Instant::now();
        let mut result = BurstResult {
            total: count,
            failures: Vec::new(),
            latency: LatencyStats::default(),
            elapsed: Duration::ZERO,
        };

        for index in 0..count {
            let req = SetRequest::text(format!("key-{}", index), format!("value-{}", index));
            let timed = invoke(BURST_DEADLINE, |ctx| self.storage.set(ctx, req)).await;
            match timed.outcome {
                Ok(_) => {
                    debug!(index, elapsed = ?timed.elapsed, "set request done");
                    result.latency.record(timed.elapsed);
                }
                Err(error) => {
                    warn!(index, %error, "set request failed");
                    result.failures.push(BurstFailure { index, error });
                }
            }
        }

        result.elapsed = started.elapsed();
        result
    }
}
