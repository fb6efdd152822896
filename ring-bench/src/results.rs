//! Run results and the append-only result store.
//!
//! The store is the hand-off to report tooling: it serializes to a JSON
//! array of records
//!
//! ```json
//! {"experiment":"growth","start_size":4,"end_size":4,"duration":3.1,"success":true,"reason":""}
//! ```
//!
//! where `duration` is `-1` for runs that were never measured.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::BenchError;
use crate::stats::SampleStats;

/// Scenario kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// Ring grows from single nodes to a target size.
    Growth,
    /// Nodes leave gracefully.
    Shrink,
    /// Nodes crash simultaneously.
    Crash,
}

impl ScenarioKind {
    /// All kinds in execution order.
    pub const ALL: [ScenarioKind; 3] = [
        ScenarioKind::Growth,
        ScenarioKind::Shrink,
        ScenarioKind::Crash,
    ];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::Growth => "growth",
            ScenarioKind::Shrink => "shrink",
            ScenarioKind::Crash => "crash",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one scenario repetition.
///
/// A successful run always carries a measured duration; only setup failures
/// carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunRecord")]
pub struct RunResult {
    #[serde(rename = "experiment")]
    kind: ScenarioKind,
    start_size: usize,
    #[serde(rename = "end_size")]
    target_size: usize,
    #[serde(serialize_with = "serialize_duration")]
    duration: Option<Duration>,
    success: bool,
    reason: String,
}

/// Unchecked wire form of [`RunResult`].
#[derive(Deserialize)]
struct RunRecord {
    experiment: ScenarioKind,
    start_size: usize,
    end_size: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    duration: Option<Duration>,
    success: bool,
    #[serde(default)]
    reason: String,
}

impl TryFrom<RunRecord> for RunResult {
    type Error = BenchError;

    fn try_from(record: RunRecord) -> Result<Self, Self::Error> {
        if record.success && record.duration.is_none() {
            return Err(BenchError::InvalidRecord(format!(
                "successful {} run {}→{} has no duration",
                record.experiment, record.start_size, record.end_size
            )));
        }
        Ok(Self {
            kind: record.experiment,
            start_size: record.start_size,
            target_size: record.end_size,
            duration: record.duration,
            success: record.success,
            reason: record.reason,
        })
    }
}

fn serialize_duration<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match duration {
        Some(d) => s.serialize_f64(d.as_secs_f64()),
        None => s.serialize_i64(-1),
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    let secs = f64::deserialize(d)?;
    if secs < 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

impl RunResult {
    /// The ring converged after `elapsed`.
    pub fn succeeded(kind: ScenarioKind, start_size: usize, target_size: usize, elapsed: Duration) -> Self {
        Self {
            kind,
            start_size,
            target_size,
            duration: Some(elapsed),
            success: true,
            reason: String::new(),
        }
    }

    /// The ring was observed for `elapsed` without converging.
    pub fn timed_out(
        kind: ScenarioKind,
        start_size: usize,
        target_size: usize,
        elapsed: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            start_size,
            target_size,
            duration: Some(elapsed),
            success: false,
            reason: reason.into(),
        }
    }

    /// The scenario never reached its measurement phase.
    pub fn setup_failed(
        kind: ScenarioKind,
        start_size: usize,
        target_size: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            start_size,
            target_size,
            duration: None,
            success: false,
            reason: reason.into(),
        }
    }

    /// Scenario kind.
    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    /// Ring size before the topology change.
    pub fn start_size(&self) -> usize {
        self.start_size
    }

    /// Expected ring size after the topology change.
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Measured duration, if any.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Duration in seconds, `-1.0` when not measured.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(-1.0)
    }

    /// Whether the ring converged.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Failure reason; empty on success.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Statistics for one `(kind, start, target)` group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    /// Scenario kind.
    pub kind: ScenarioKind,
    /// Ring size before the change.
    pub start_size: usize,
    /// Ring size after the change.
    pub target_size: usize,
    /// Runs in the group.
    pub runs: usize,
    /// Successful runs.
    pub successes: usize,
    /// Durations of successful runs, in seconds.
    pub durations: Option<SampleStats>,
}

impl GroupStats {
    /// Fraction of successful runs in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        rate(self.successes, self.runs)
    }
}

/// Overall statistics for one scenario kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindSummary {
    /// Scenario kind.
    pub kind: ScenarioKind,
    /// Runs of this kind.
    pub runs: usize,
    /// Successful runs.
    pub successes: usize,
    /// Durations of successful runs, in seconds.
    pub durations: Option<SampleStats>,
}

impl KindSummary {
    /// Success percentage in `[0, 100]`.
    pub fn success_percentage(&self) -> f64 {
        rate(self.successes, self.runs) * 100.0
    }
}

fn rate(successes: usize, runs: usize) -> f64 {
    if runs == 0 {
        0.0
    } else {
        successes as f64 / runs as f64
    }
}

fn successful_durations<'a>(runs: impl IntoIterator<Item = &'a RunResult>) -> Vec<f64> {
    runs.into_iter()
        .filter(|r| r.success)
        .filter_map(|r| r.duration)
        .map(|d| d.as_secs_f64())
        .collect()
}

/// Append-only log of run results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultStore {
    records: Vec<RunResult>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result.
    pub fn push(&mut self, result: RunResult) {
        self.records.push(result);
    }

    /// All results in insertion order.
    pub fn records(&self) -> &[RunResult] {
        &self.records
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no result has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Results of one kind, in insertion order.
    pub fn by_kind(&self, kind: ScenarioKind) -> impl Iterator<Item = &RunResult> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Per-group statistics, ordered by kind, start size and target size.
    pub fn groups(&self) -> Vec<GroupStats> {
        let mut grouped: BTreeMap<(ScenarioKind, usize, usize), Vec<&RunResult>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry((record.kind, record.start_size, record.target_size))
                .or_default()
                .push(record);
        }

        grouped
            .into_iter()
            .map(|((kind, start_size, target_size), runs)| GroupStats {
                kind,
                start_size,
                target_size,
                runs: runs.len(),
                successes: runs.iter().filter(|r| r.success).count(),
                durations: SampleStats::from_samples(&successful_durations(runs.iter().copied())),
            })
            .collect()
    }

    /// Overall statistics for `kind`; `None` if it never ran.
    pub fn summary(&self, kind: ScenarioKind) -> Option<KindSummary> {
        let runs: Vec<&RunResult> = self.by_kind(kind).collect();
        if runs.is_empty() {
            return None;
        }
        Some(KindSummary {
            kind,
            runs: runs.len(),
            successes: runs.iter().filter(|r| r.success).count(),
            durations: SampleStats::from_samples(&successful_durations(runs.iter().copied())),
        })
    }

    /// Write all results to `path` as a JSON array.
    pub fn save(&self, path: &Path) -> Result<(), BenchError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Extend<RunResult> for ResultStore {
    fn extend<I: IntoIterator<Item = RunResult>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn constructors_uphold_duration_invariant() {
        let ok = RunResult::succeeded(ScenarioKind::Growth, 4, 4, secs(1.5));
        assert!(ok.success());
        assert_eq!(ok.duration_secs(), 1.5);
        assert_eq!(ok.reason(), "");

        let slow = RunResult::timed_out(
            ScenarioKind::Shrink,
            8,
            4,
            secs(120.0),
            "Timeout waiting for stability",
        );
        assert!(!slow.success());
        assert_eq!(slow.duration_secs(), 120.0);

        let dead = RunResult::setup_failed(ScenarioKind::Growth, 4, 4, "Not all nodes alive");
        assert!(!dead.success());
        assert_eq!(dead.duration(), None);
        assert_eq!(dead.duration_secs(), -1.0);
    }

    #[test]
    fn unmeasured_duration_serializes_as_minus_one() {
        let dead = RunResult::setup_failed(ScenarioKind::Crash, 32, 30, "Initial network didn't stabilize");
        let json = serde_json::to_value(&dead).unwrap();
        assert_eq!(json["experiment"], "crash");
        assert_eq!(json["end_size"], 30);
        assert_eq!(json["duration"], -1);
        assert_eq!(json["success"], false);
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut store = ResultStore::new();
        store.push(RunResult::succeeded(ScenarioKind::Growth, 2, 2, secs(0.25)));
        store.push(RunResult::setup_failed(ScenarioKind::Growth, 4, 4, "Not all nodes alive"));

        let json = serde_json::to_string(&store).unwrap();
        let back: ResultStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn successful_record_without_duration_is_rejected() {
        let json = r#"[{"experiment":"growth","start_size":2,"end_size":2,"duration":-1,"success":true,"reason":""}]"#;
        assert!(serde_json::from_str::<ResultStore>(json).is_err());
    }

    #[test]
    fn missing_reason_defaults_to_empty() {
        let json = r#"[{"experiment":"shrink","start_size":8,"end_size":4,"duration":2.5,"success":true}]"#;
        let store: ResultStore = serde_json::from_str(json).unwrap();
        assert_eq!(store.records()[0].reason(), "");
        assert_eq!(store.records()[0].target_size(), 4);
    }

    #[test]
    fn groups_reduce_successful_runs_only() {
        let mut store = ResultStore::new();
        store.push(RunResult::succeeded(ScenarioKind::Growth, 4, 4, secs(1.0)));
        store.push(RunResult::succeeded(ScenarioKind::Growth, 4, 4, secs(2.0)));
        store.push(RunResult::succeeded(ScenarioKind::Growth, 4, 4, secs(3.0)));
        store.push(RunResult::timed_out(ScenarioKind::Growth, 4, 4, secs(120.0), "Timeout waiting for stability"));
        store.push(RunResult::succeeded(ScenarioKind::Growth, 2, 2, secs(0.5)));

        let groups = store.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].start_size, groups[0].target_size), (2, 2));

        let four = &groups[1];
        assert_eq!(four.runs, 4);
        assert_eq!(four.successes, 3);
        assert_eq!(four.success_rate(), 0.75);
        let stats = four.durations.unwrap();
        assert!((stats.mean - 2.0).abs() < 1e-9);
        assert!((stats.stddev - 0.816_496_580_927_726).abs() < 1e-6);
    }

    #[test]
    fn group_without_success_has_no_statistics() {
        let mut store = ResultStore::new();
        store.push(RunResult::setup_failed(ScenarioKind::Crash, 32, 31, "Initial network didn't stabilize"));

        let groups = store.groups();
        assert_eq!(groups[0].successes, 0);
        assert!(groups[0].durations.is_none());
        assert_eq!(groups[0].success_rate(), 0.0);
    }

    #[test]
    fn summary_per_kind() {
        let mut store = ResultStore::new();
        store.push(RunResult::succeeded(ScenarioKind::Crash, 32, 31, secs(4.0)));
        store.push(RunResult::timed_out(ScenarioKind::Crash, 32, 16, secs(120.0), "Network couldn't tolerate 16 crashes"));
        store.push(RunResult::succeeded(ScenarioKind::Growth, 2, 2, secs(1.0)));

        let crash = store.summary(ScenarioKind::Crash).unwrap();
        assert_eq!(crash.runs, 2);
        assert_eq!(crash.success_percentage(), 50.0);
        assert_eq!(crash.durations.unwrap().max, 4.0);

        assert!(store.summary(ScenarioKind::Shrink).is_none());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let mut store = ResultStore::new();
        store.push(RunResult::succeeded(ScenarioKind::Shrink, 16, 8, secs(6.5)));
        store.save(&path).unwrap();

        let loaded = ResultStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records()[0].kind(), ScenarioKind::Shrink);
        assert_eq!(loaded.records()[0].duration_secs(), 6.5);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ScenarioKind::Growth.to_string(), "growth");
        assert_eq!(ScenarioKind::ALL.len(), 3);
    }
}
