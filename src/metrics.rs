//! Metrics collection and reporting for pipeline runs.
//!
//! - [`Metric`] trait defines the interface for custom metrics
//! - [`MetricsCollector`] manages metric registration and collection
//! - [`MetricsObserver`] fills a collector from [`PipelineEvent`]s
//! - Metrics are exported as JSON, in memory or to a file
//!
//! # Example
//!
//! ```no_run
//! use dirflow::metrics::{MetricsCollector, MetricsObserver};
//! use dirflow::{Orchestrator, PipelineConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = MetricsCollector::new();
//! let orchestrator = Orchestrator::from_config(PipelineConfig::default())?
//!     .with_observer(Arc::new(MetricsObserver::new(metrics.clone())));
//! orchestrator.run("./input")?;
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::observer::{PipelineEvent, PipelineObserver};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Trait for custom metrics.
pub trait Metric: Send + Sync + Any {
    /// The name of this metric (e.g., `modules_loaded`, `stage.mapper.duration_ms`).
    fn name(&self) -> &str;

    /// The current value of this metric as a JSON value.
    fn value(&self) -> Value;

    /// Optional description of what this metric measures.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Cast to Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Thread-safe container for run metrics. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Default)]
struct MetricsCollectorInner {
    metrics: BTreeMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollectorInner {
    fn get<M: Metric>(&self, name: &str) -> Option<&M> {
        self.metrics
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<M>())
    }

    fn insert(&mut self, metric: Box<dyn Metric>) {
        self.metrics.insert(metric.name().to_string(), metric);
    }

    fn elapsed(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a metric, replacing any metric of the same name.
    pub fn register(&self, metric: Box<dyn Metric>) {
        self.lock().insert(metric);
    }

    pub fn record_start(&self) {
        self.lock().start_time = Some(Instant::now());
    }

    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    /// Time between [`record_start`](Self::record_start) and [`record_end`](Self::record_end).
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.lock().elapsed()
    }

    /// Add `value` to the counter `name`, creating it at zero first if needed.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.lock();
        let current = inner.get::<CounterMetric>(name).map_or(0, |c| c.count);
        inner.insert(Box::new(CounterMetric::with_value(name, current + value)));
    }

    /// Current value of the counter `name`, if it exists and is a counter.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.lock().get::<CounterMetric>(name).map(|c| c.count)
    }

    /// Append `value` to the histogram `name`, creating it if needed.
    pub fn observe(&self, name: &str, value: f64, description: &str) {
        let mut inner = self.lock();
        let mut values = inner
            .get::<HistogramMetric>(name)
            .map(|h| h.values.clone())
            .unwrap_or_default();
        values.push(value);
        inner.insert(Box::new(
            HistogramMetric::with_values(name, values).with_description(description),
        ));
    }

    pub fn set_gauge(&self, name: &str, value: f64, description: &str) {
        self.register(Box::new(
            GaugeMetric::new(name, value).with_description(description),
        ));
    }

    /// All metrics as a JSON object, plus `execution_time_ms` once the run ended.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.lock();
        let mut metrics_json = serde_json::Map::new();
        for (name, metric) in &inner.metrics {
            let mut metric_obj = serde_json::Map::new();
            metric_obj.insert("value".to_string(), metric.value());
            if let Some(desc) = metric.description() {
                metric_obj.insert("description".to_string(), json!(desc));
            }
            metrics_json.insert(name.clone(), Value::Object(metric_obj));
        }
        if let Some(elapsed) = inner.elapsed() {
            metrics_json.insert(
                "execution_time_ms".to_string(),
                json!({
                    "value": elapsed.as_millis() as u64,
                    "description": "Total run time in milliseconds",
                }),
            );
        }
        Value::Object(metrics_json)
    }

    /// Save all metrics to a pretty-printed JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Snapshot of all metric names and values.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock()
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }
}

// ========== Built-in Metrics ==========

/// A monotonically growing count.
pub struct CounterMetric {
    name: String,
    count: u64,
}

impl CounterMetric {
    pub fn with_value(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

impl Metric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.count)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A gauge metric that holds a single numeric value.
pub struct GaugeMetric {
    name: String,
    value: f64,
    description: Option<String>,
}

impl GaugeMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Metric for GaugeMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.value)
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Distribution of observed values, reported as count, sum, mean, min and max.
pub struct HistogramMetric {
    name: String,
    values: Vec<f64>,
    description: Option<String>,
}

impl HistogramMetric {
    pub fn with_values(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Metric for HistogramMetric {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::cast_precision_loss)]
    fn value(&self) -> Value {
        if self.values.is_empty() {
            return json!({ "count": 0 });
        }
        let sum: f64 = self.values.iter().sum();
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        json!({
            "count": self.values.len(),
            "sum": sum,
            "mean": sum / self.values.len() as f64,
            "min": min,
            "max": max,
        })
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Observer that turns run events into metrics.
#[derive(Clone, Default)]
pub struct MetricsObserver {
    metrics: MetricsCollector,
}

impl MetricsObserver {
    #[must_use]
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

impl PipelineObserver for MetricsObserver {
    fn on_event(&self, event: &PipelineEvent) {
        let m = &self.metrics;
        match event {
            PipelineEvent::RunStarted { .. } => m.record_start(),
            PipelineEvent::ModuleLoaded { .. } => m.increment_counter("modules_loaded", 1),
            PipelineEvent::StageStarted { .. } | PipelineEvent::OutputWritten { .. } => {}
            PipelineEvent::StageCompleted { stage, elapsed } => {
                let ms = elapsed.as_secs_f64() * 1000.0;
                m.increment_counter("stages_completed", 1);
                m.set_gauge(
                    &format!("stage.{stage}.duration_ms"),
                    ms,
                    "Wall time of construct, run and output",
                );
                m.observe("stage_duration_ms", ms, "Wall time per stage");
            }
            PipelineEvent::StageFailed { .. } => m.increment_counter("stages_failed", 1),
            PipelineEvent::InstanceDestroyed { .. } => {
                m.increment_counter("instances_destroyed", 1);
            }
            PipelineEvent::ModuleUnloaded { .. } => m.increment_counter("modules_unloaded", 1),
            PipelineEvent::ConsistencyChecked {
                missing,
                unexpected,
            } => {
                m.set_gauge(
                    "consistency.missing",
                    missing.len() as f64,
                    "Input files absent from the final output",
                );
                m.set_gauge(
                    "consistency.unexpected",
                    unexpected.len() as f64,
                    "Final output files absent from the input",
                );
            }
            PipelineEvent::RunCompleted { .. } => {
                m.record_end();
                m.increment_counter("runs_succeeded", 1);
            }
            PipelineEvent::RunFailed { .. } => {
                m.record_end();
                m.increment_counter("runs_failed", 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use std::path::PathBuf;

    #[test]
    fn counters_accumulate() {
        let m = MetricsCollector::new();
        m.increment_counter("modules_loaded", 1);
        m.increment_counter("modules_loaded", 2);
        assert_eq!(m.counter("modules_loaded"), Some(3));
        assert_eq!(m.counter("absent"), None);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let m = MetricsCollector::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let m = m.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        m.increment_counter("modules_loaded", 1);
                        m.observe("stage_duration_ms", 1.0, "Wall time per stage");
                    }
                });
            }
        });
        assert_eq!(m.counter("modules_loaded"), Some(8000));
        assert_eq!(m.snapshot()["stage_duration_ms"]["count"], json!(8000));
    }

    #[test]
    fn execution_time_is_exported_once_the_run_ended() {
        let m = MetricsCollector::new();
        m.record_start();
        assert!(m.elapsed().is_none());
        assert!(m.to_json().get("execution_time_ms").is_none());
        m.record_end();
        assert!(m.elapsed().is_some());
        assert!(m.to_json()["execution_time_ms"]["value"].is_u64());
    }

    #[test]
    fn observer_records_stage_durations_and_outcome() {
        let observer = MetricsObserver::default();
        for stage in [StageKind::InputReader, StageKind::Mapper] {
            observer.on_event(&PipelineEvent::StageCompleted {
                stage,
                elapsed: Duration::from_secs(2),
            });
        }
        observer.on_event(&PipelineEvent::ModuleUnloaded {
            stage: StageKind::Mapper,
            path: PathBuf::from("m.so"),
        });
        observer.on_event(&PipelineEvent::RunFailed {
            error: "boom".into(),
        });

        let snapshot = observer.metrics().snapshot();
        assert_eq!(snapshot["stages_completed"], json!(2));
        assert_eq!(snapshot["modules_unloaded"], json!(1));
        assert_eq!(snapshot["runs_failed"], json!(1));
        assert_eq!(snapshot["stage.mapper.duration_ms"], json!(2000.0));
        assert_eq!(snapshot["stage_duration_ms"]["count"], json!(2));
    }

    #[test]
    fn saves_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let m = MetricsCollector::new();
        m.set_gauge("consistency.missing", 0.0, "missing files");
        let path = dir.path().join("metrics.json");
        m.save_to_file(&path)?;
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(saved["consistency.missing"]["value"], json!(0.0));
        Ok(())
    }
}
