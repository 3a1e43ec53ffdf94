//! ProcessAnalysisHandler - the deferred analysis entry point.
//!
//! Runs once per delivered job, independently of the turn that queued
//! it. The platform waits on exactly one callback per job, so every
//! path below delivers exactly one reply, success or not.
//!
//! Jobs arrive at least once. A redelivered job re-runs the analysis,
//! writes the same fields again and sends a duplicate callback.
//!
//! The judgement is always taken from the merged snapshot that gets
//! stored, so `last_judgement` never disagrees with `extracted_data`.

use std::sync::Arc;

use crate::domain::intake::prompts::{
    ANALYSIS_APOLOGY, POST_ANALYSIS_CHOICES, POST_ANALYSIS_FOLLOW_UP,
};
use crate::domain::foundation::ValidationError;
use crate::domain::intake::{
    format_report, judge, judge_value, ConversationRecord, ExtractedData, IntakeState, Judgement,
    Possibility, RecordPatch, Reply, Turn,
};
use crate::ports::{AnalysisJob, CallbackError, CallbackSender, ConversationStore, IntakeAssistant};

/// Illustration references for the result card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCardImages {
    pub high_risk_url: String,
    pub low_risk_url: String,
}

impl ResultCardImages {
    pub fn for_possibility(&self, possibility: Possibility) -> &str {
        match possibility {
            Possibility::Present => &self.high_risk_url,
            Possibility::Low | Possibility::Insufficient => &self.low_risk_url,
        }
    }
}

/// Command carrying one dequeued job.
#[derive(Debug, Clone)]
pub struct ProcessAnalysisCommand {
    pub job: AnalysisJob,
}

/// What happened to a job whose reply was delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessAnalysisOutcome {
    /// Result persisted on the record and delivered.
    Completed(Judgement),
    /// The conversation was gone; result delivered, nothing persisted.
    DeliveredOnly(Judgement),
    /// Analysis, lookup or persistence failed; an apology was delivered.
    Failed,
}

/// The single callback could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum ProcessAnalysisError {
    #[error("callback delivery failed: {0}")]
    Delivery(#[from] CallbackError),
}

/// Handler for deferred analysis jobs.
pub struct ProcessAnalysisHandler {
    store: Arc<dyn ConversationStore>,
    assistant: Arc<dyn IntakeAssistant>,
    callback: Arc<dyn CallbackSender>,
    images: ResultCardImages,
}

impl ProcessAnalysisHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        assistant: Arc<dyn IntakeAssistant>,
        callback: Arc<dyn CallbackSender>,
        images: ResultCardImages,
    ) -> Self {
        Self {
            store,
            assistant,
            callback,
            images,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessAnalysisCommand,
    ) -> Result<ProcessAnalysisOutcome, ProcessAnalysisError> {
        let job = cmd.job;
        let (outcome, reply) = self.analyze(&job).await;

        self.callback.deliver(&job.callback_url, &reply).await?;
        tracing::info!(
            user_key = %job.user_key,
            job_id = %job.job_id,
            outcome = ?outcome,
            "analysis reply delivered"
        );

        Ok(outcome)
    }

    async fn analyze(&self, job: &AnalysisJob) -> (ProcessAnalysisOutcome, Reply) {
        let failed = || (ProcessAnalysisOutcome::Failed, Reply::text(ANALYSIS_APOLOGY));

        let record = match self.store.get(&job.user_key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(user_key = %job.user_key, error = %e, "failed to load conversation");
                return failed();
            }
        };

        let raw = match self.assistant.analyze(&job.user_key, &job.history).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(user_key = %job.user_key, job_id = %job.job_id, error = %e, "analysis failed");
                return failed();
            }
        };

        let base = record
            .as_ref()
            .map(|r| &r.extracted_data)
            .unwrap_or(&job.extracted_data);
        let (merged, judgement) = match ExtractedData::from_json(&raw) {
            Some(update) => {
                let merged = base.merged_with(&update);
                let judgement = judge(&merged);
                (merged, judgement)
            }
            None => {
                tracing::warn!(
                    user_key = %job.user_key,
                    job_id = %job.job_id,
                    "analysis result is not a symptom mapping"
                );
                (base.clone(), judge_value(&raw))
            }
        };

        let report = format_report(&judgement, &merged).render();
        let reply = Reply::card(
            format!("{}\n\n{}", report, POST_ANALYSIS_FOLLOW_UP),
            self.images.for_possibility(judgement.possibility),
            POST_ANALYSIS_CHOICES,
        );

        let Some(record) = record else {
            return Self::delivered_only(job, judgement, reply);
        };

        let patch = match result_patch(&record, merged, judgement.clone(), report) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::error!(user_key = %job.user_key, state = %record.state, error = %e, "analysis result refused");
                return failed();
            }
        };
        // The conversation may have been terminated while the analysis ran.
        match self.store.merge_existing(&job.user_key, &patch).await {
            Ok(true) => (ProcessAnalysisOutcome::Completed(judgement), reply),
            Ok(false) => Self::delivered_only(job, judgement, reply),
            Err(e) => {
                tracing::error!(user_key = %job.user_key, error = %e, "failed to persist analysis result");
                failed()
            }
        }
    }

    fn delivered_only(
        job: &AnalysisJob,
        judgement: Judgement,
        reply: Reply,
    ) -> (ProcessAnalysisOutcome, Reply) {
        tracing::warn!(
            user_key = %job.user_key,
            job_id = %job.job_id,
            "conversation no longer exists; result not persisted"
        );
        (ProcessAnalysisOutcome::DeliveredOnly(judgement), reply)
    }
}

/// Moves the record to POST_ANALYSIS with the result.
///
/// The report turn is skipped when it already ends the history, so a
/// redelivered job leaves the record as the first delivery did.
fn result_patch(
    record: &ConversationRecord,
    merged: ExtractedData,
    judgement: Judgement,
    report: String,
) -> Result<RecordPatch, ValidationError> {
    let patch = RecordPatch::transition(record.state, IntakeState::PostAnalysis)?
        .with_extracted_data(merged)
        .with_judgement(judgement);

    let report_turn = Turn::bot(report);
    if record.history.last() == Some(&report_turn) {
        Ok(patch)
    } else {
        Ok(patch.append(report_turn))
    }
}
