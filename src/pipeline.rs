//! Sequential classification run over stored call days.
//!
//! Batches run strictly one after another with a fixed delay between them,
//! and each batch is merged into the [`ClassificationStore`] before the next
//! starts. A crash therefore loses at most the batch in flight. A re-run
//! skips every call that already has an entry, except entries the model
//! left degraded, which go back to the model.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::call::CallRecord;
use crate::classify::llm::{BatchItem, DEFAULT_BATCH_SIZE, LlmClassifier};
use crate::classify::overrides::apply_overrides;
use crate::classify::rules::{self, RuleVerdict};
use crate::classify::{ClassifierMode, RULES_MODEL, classify_offline};
use crate::features::{ExtractorConfig, Features};
use crate::llm::ChatModel;
use crate::store::{CallStore, ClassificationStore, EnrichmentEntry};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: ClassifierMode,
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Reclassify calls that already have a stored entry.
    pub force: bool,
    pub extractor: ExtractorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_secs(1),
            force: false,
            extractor: ExtractorConfig::default(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub days: usize,
    pub calls_seen: usize,
    pub skipped: usize,
    /// Previously degraded calls sent back for classification.
    pub retried: usize,
    pub rules_classified: usize,
    pub model_classified: usize,
    /// Model calls that came back unknown before the override chain.
    pub degraded: usize,
    pub failed_batches: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: RunSummary) {
        self.days += other.days;
        self.calls_seen += other.calls_seen;
        self.skipped += other.skipped;
        self.retried += other.retried;
        self.rules_classified += other.rules_classified;
        self.model_classified += other.model_classified;
        self.degraded += other.degraded;
        self.failed_batches += other.failed_batches;
    }
}

pub struct Pipeline<'a, M> {
    calls: &'a CallStore,
    store: &'a ClassificationStore,
    classifier: Option<&'a LlmClassifier<M>>,
    config: PipelineConfig,
    batches_sent: usize,
}

impl<'a, M: ChatModel> Pipeline<'a, M> {
    /// Fails when the mode needs a model and none is given, or when the
    /// batch size is zero.
    pub fn new(
        calls: &'a CallStore,
        store: &'a ClassificationStore,
        classifier: Option<&'a LlmClassifier<M>>,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.mode.uses_model() && classifier.is_none() {
            bail!("classifier mode {:?} requires a language model", config.mode);
        }
        if config.batch_size == 0 {
            bail!("batch size must be greater than zero");
        }
        Ok(Self {
            calls,
            store,
            classifier,
            config,
            batches_sent: 0,
        })
    }

    /// Classifies every day from `from` to `to`, inclusive.
    #[tracing::instrument(skip(self), fields(mode = ?self.config.mode))]
    pub async fn run(&mut self, from: NaiveDate, to: NaiveDate) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for day in from.iter_days().take_while(|d| *d <= to) {
            summary.absorb(self.run_day(day).await?);
        }
        info!(
            days = summary.days,
            calls = summary.calls_seen,
            skipped = summary.skipped,
            retried = summary.retried,
            rules = summary.rules_classified,
            model = summary.model_classified,
            degraded = summary.degraded,
            failed_batches = summary.failed_batches,
            "Classification run complete"
        );
        Ok(summary)
    }

    #[tracing::instrument(skip(self), fields(date = %date))]
    pub async fn run_day(&mut self, date: NaiveDate) -> Result<RunSummary> {
        let calls = self.calls.load_day(date)?;
        let mut summary = RunSummary {
            days: 1,
            calls_seen: calls.len(),
            ..Default::default()
        };
        if calls.is_empty() {
            return Ok(summary);
        }

        let existing = self.store.load_day(date)?;
        let pending: Vec<(&CallRecord, Features)> = calls
            .iter()
            .filter(|c| {
                self.config.force || existing.get(&c.id).is_none_or(|entry| entry.degraded)
            })
            .map(|c| (c, Features::from_call(c, &self.config.extractor)))
            .collect();
        summary.skipped = calls.len() - pending.len();
        summary.retried = pending
            .iter()
            .filter(|(c, _)| existing.get(&c.id).is_some_and(|entry| entry.degraded))
            .count();

        let mut decided = Vec::new();
        let mut for_model: Vec<BatchItem<'_>> = Vec::new();

        for (call, features) in &pending {
            match self.config.mode {
                ClassifierMode::Rules => {
                    decided.push(EnrichmentEntry::new(
                        call,
                        &classify_offline(call, features),
                        RULES_MODEL,
                    ));
                }
                ClassifierMode::Llm => for_model.push(BatchItem { call, features }),
                ClassifierMode::Hybrid => match rules::classify(call, features) {
                    RuleVerdict::Classified { classification, .. } => {
                        let final_classification = apply_overrides(classification, features);
                        decided.push(EnrichmentEntry::new(call, &final_classification, RULES_MODEL));
                    }
                    RuleVerdict::NeedsExternalJudgment { .. } => {
                        for_model.push(BatchItem { call, features })
                    }
                },
            }
        }

        summary.rules_classified = decided.len();
        if !decided.is_empty() {
            self.store.merge_day(date, decided)?;
        }

        if let Some(classifier) = self.classifier {
            for batch in for_model.chunks(self.config.batch_size) {
                if self.batches_sent > 0 && !self.config.batch_delay.is_zero() {
                    tokio::time::sleep(self.config.batch_delay).await;
                }
                self.batches_sent += 1;

                let outcome = classifier.classify_batch(batch).await;
                if outcome.request_failed {
                    summary.failed_batches += 1;
                    error!(batch = self.batches_sent, size = batch.len(), "Batch degraded to unknown");
                }
                summary.degraded += outcome.degraded;
                summary.model_classified += batch.len();

                let entries = batch
                    .iter()
                    .zip(outcome.results)
                    .zip(outcome.needs_retry)
                    .map(|((item, raw), retry)| {
                        let final_classification = apply_overrides(raw, item.features);
                        EnrichmentEntry::new(item.call, &final_classification, classifier.model_name())
                            .with_degraded(retry)
                    });
                self.store.merge_day(date, entries)?;
            }
        }

        info!(
            calls = summary.calls_seen,
            skipped = summary.skipped,
            rules = summary.rules_classified,
            model = summary.model_classified,
            "Day classified"
        );
        Ok(summary)
    }
}
