use crate::collab::{BudgetSink, DocumentConverter, OcrEngine, ProposalGenerator};
use crate::error::{Result, WorkflowError};
use crate::snapshot::RunSnapshot;
use crate::state::{ApprovalPayload, RunStatus, WorkflowState};
use proposal_chunker::{ChunkDefinition, ChunkSplitter, SplitterConfig};
use proposal_completion::StructuredCompletion;
use proposal_facts::{merge_extracted, BudgetMatrix, EnrichedFacts, ExtractedFacts, RateCard};
use proposal_pipeline::{
    BudgetEstimator, ExtractionUnit, ProjectAnalyzer, ProposalWriter, RequirementAnalysisUnit,
    ReverseRagRefiner,
};
use proposal_vector_index::{Embedder, IndexedChunk, VectorIndex};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::timeout;

/// Tuning knobs of one run.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub splitter: SplitterConfig,

    /// Chunks processed concurrently per batch. Batches are strictly
    /// sequential; the completion backend degrades under excess concurrency.
    pub batch_size: usize,

    /// Minimum confidence for reverse-RAG enrichment
    pub min_confidence: f32,

    /// Timeout for conversion and OCR
    pub convert_timeout: Duration,

    /// Timeout for one per-chunk extraction or analysis call
    pub unit_timeout: Duration,

    /// Timeout for the document-level steps (refine, analyze, budget,
    /// proposal generation)
    pub step_timeout: Duration,

    /// Stages used when the analyzer suggests none
    pub default_stages: Vec<String>,

    /// Roles used when the analyzer suggests none
    pub default_roles: Vec<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            batch_size: 1,
            min_confidence: proposal_pipeline::DEFAULT_MIN_CONFIDENCE,
            convert_timeout: Duration::from_secs(600),
            unit_timeout: Duration::from_secs(3_600),
            step_timeout: Duration::from_secs(600),
            default_stages: ["Discovery", "Prototype", "Development", "Testing"]
                .map(String::from)
                .to_vec(),
            default_roles: ["Manager", "Frontend", "Backend", "Designer"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Capabilities a run depends on.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub completion: Arc<dyn StructuredCompletion>,
    pub embedder: Arc<dyn Embedder>,
    pub converter: Arc<dyn DocumentConverter>,
    pub ocr: Arc<dyn OcrEngine>,
    pub proposal: Arc<dyn ProposalGenerator>,
    pub budget_sink: Arc<dyn BudgetSink>,
}

/// One long-lived orchestration instance per document.
///
/// The run exclusively owns its mutable state; the only external mutator is
/// [`WorkflowRun::signal_approval`]. External pollers read snapshots through
/// [`WorkflowRun::state`] or subscribe to changes with
/// [`WorkflowRun::subscribe`].
pub struct WorkflowRun {
    run_id: String,
    dir: PathBuf,
    config: WorkflowConfig,
    deps: WorkflowDeps,
    index: Arc<VectorIndex>,
    snapshot: Mutex<RunSnapshot>,
    state_tx: watch::Sender<WorkflowState>,
    approval: Notify,
}

impl WorkflowRun {
    /// Create a fresh run for a source document, persisting the initial
    /// snapshot into `dir`.
    pub async fn create(
        source_path: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        config: WorkflowConfig,
        deps: WorkflowDeps,
    ) -> Result<Arc<Self>> {
        config
            .splitter
            .validate()
            .map_err(WorkflowError::InvalidConfig)?;

        let source_path = source_path.into();
        let dir = dir.into();
        let run_id = uuid::Uuid::new_v4().to_string();

        let mut snapshot = RunSnapshot::new(run_id.clone(), &source_path);
        snapshot.document_fingerprint = fingerprint_file(&source_path).await.ok();
        snapshot.save(&dir).await?;

        log::info!("Created run {run_id} for {}", source_path.display());
        Ok(Self::from_snapshot(dir, config, deps, snapshot))
    }

    /// Reconstruct a run from its persisted snapshot after a restart.
    pub async fn resume(
        dir: impl Into<PathBuf>,
        config: WorkflowConfig,
        deps: WorkflowDeps,
    ) -> Result<Arc<Self>> {
        let dir = dir.into();
        let snapshot = RunSnapshot::load(&dir).await?;

        log::info!(
            "Resuming run {} with status {}",
            snapshot.run_id,
            snapshot.state.status
        );
        Ok(Self::from_snapshot(dir, config, deps, snapshot))
    }

    fn from_snapshot(
        dir: PathBuf,
        config: WorkflowConfig,
        deps: WorkflowDeps,
        snapshot: RunSnapshot,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(snapshot.state.clone());
        Arc::new(Self {
            run_id: snapshot.run_id.clone(),
            dir,
            config,
            index: Arc::new(VectorIndex::new(deps.embedder.clone())),
            deps,
            snapshot: Mutex::new(snapshot),
            state_tx,
            approval: Notify::new(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Current state snapshot
    pub async fn state(&self) -> WorkflowState {
        self.snapshot.lock().await.state.clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    /// Deliver the human approval signal.
    ///
    /// Accepted only while the run is `WAITING_FOR_HUMAN`. A later signal
    /// before the run wakes deterministically overwrites the earlier payload
    /// (last signal wins); once the run has left the gate, signals are
    /// rejected.
    pub async fn signal_approval(&self, payload: ApprovalPayload) -> Result<()> {
        {
            let mut snap = self.snapshot.lock().await;
            if snap.state.status != RunStatus::WaitingForHuman {
                return Err(WorkflowError::SignalRejected(format!(
                    "run is {}",
                    snap.state.status
                )));
            }

            snap.state.extracted_data = Some(payload.updated_facts.clone());
            snap.state.budget = Some(payload.budget.clone());
            snap.state.rates = Some(payload.rates.clone());
            snap.state.is_approved = true;
            snap.approval = Some(payload);
            snap.save(&self.dir).await?;
            self.state_tx.send_replace(snap.state.clone());
        }

        self.approval.notify_waiters();
        log::info!("Run {} approved", self.run_id);
        Ok(())
    }

    /// Drive the run to its terminal state, returning the generated proposal.
    ///
    /// Safe to call on a resumed run at any lifecycle point: completed phases
    /// are skipped based on the snapshot, a run at the gate re-arms it, and a
    /// terminal run returns its stored outcome.
    pub async fn execute(self: Arc<Self>) -> Result<String> {
        match self.execute_inner().await {
            Ok(proposal) => Ok(proposal),
            Err(err) => {
                match &err {
                    WorkflowError::ConversionFailed(_) | WorkflowError::NoContent => {
                        let reason = err.to_string();
                        log::error!("Run {} failed: {reason}", self.run_id);
                        let _ = self
                            .mutate(move |s| s.state.status = RunStatus::Error(reason))
                            .await;
                    }
                    _ => log::error!("Run {} aborted: {err}", self.run_id),
                }
                Err(err)
            }
        }
    }

    async fn execute_inner(&self) -> Result<String> {
        let status = {
            let snap = self.snapshot.lock().await;
            snap.state.status.clone()
        };

        match status {
            RunStatus::Completed => {
                let snap = self.snapshot.lock().await;
                return Ok(snap.state.final_proposal.clone().unwrap_or_default());
            }
            RunStatus::Error(reason) => {
                return Err(WorkflowError::NotResumable(reason));
            }
            RunStatus::Processing => {
                self.run_processing().await?;
                self.await_approval().await;
            }
            RunStatus::WaitingForHuman => {
                self.await_approval().await;
            }
            // Approval is already recorded; only generation is left.
            RunStatus::Generating => {}
        }

        self.mutate(|s| s.state.status = RunStatus::Generating)
            .await?;

        let proposal = self.generate_proposal().await;
        self.save_budget_best_effort().await;

        let stored = proposal.clone();
        self.mutate(move |s| {
            s.state.final_proposal = Some(stored);
            s.state.status = RunStatus::Completed;
        })
        .await?;

        log::info!("Run {} completed", self.run_id);
        Ok(proposal)
    }

    /// The PROCESSING phase: conversion through budget suggestion.
    async fn run_processing(&self) -> Result<()> {
        let markdown_path = self.phase_convert().await?;
        let chunks = self.phase_split(&markdown_path).await?;
        self.phase_index(&chunks).await?;
        self.phase_map(&chunks).await?;
        self.phase_refine().await?;
        self.phase_reduce().await?;
        self.phase_budget().await?;

        self.mutate(|s| s.state.status = RunStatus::WaitingForHuman)
            .await?;
        Ok(())
    }

    async fn phase_convert(&self) -> Result<PathBuf> {
        let (existing, source) = {
            let snap = self.snapshot.lock().await;
            (snap.markdown_path.clone(), snap.source_path.clone())
        };
        if let Some(path) = existing {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
        }

        let converted = match timeout(
            self.config.convert_timeout,
            self.deps.converter.convert(&source),
        )
        .await
        {
            Ok(Ok(doc)) => doc,
            Ok(Err(err)) => {
                log::error!("Conversion failed for {}: {err}", source.display());
                None
            }
            Err(_) => {
                log::error!("Conversion timed out for {}", source.display());
                None
            }
        };

        let markdown_path = match converted {
            Some(doc) => Some(doc.markdown_path),
            None => {
                log::info!(
                    "Conversion produced nothing, trying OCR for {}",
                    source.display()
                );
                self.try_ocr(&source).await?
            }
        };

        let Some(markdown_path) = markdown_path else {
            return Err(WorkflowError::ConversionFailed(
                "conversion and OCR both produced no text".to_string(),
            ));
        };

        let recorded = markdown_path.clone();
        self.mutate(move |s| {
            s.state.source_preview = Some(format!(
                "Document converted successfully. Path: {}",
                recorded.display()
            ));
            s.markdown_path = Some(recorded);
        })
        .await?;

        Ok(markdown_path)
    }

    async fn try_ocr(&self, source: &Path) -> Result<Option<PathBuf>> {
        match timeout(self.config.convert_timeout, self.deps.ocr.recognize(source)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                let path = self.dir.join("ocr.md");
                tokio::fs::write(&path, text).await?;
                Ok(Some(path))
            }
            Ok(Ok(_)) => Ok(None),
            Ok(Err(err)) => {
                log::error!("OCR failed for {}: {err}", source.display());
                Ok(None)
            }
            Err(_) => {
                log::error!("OCR timed out for {}", source.display());
                Ok(None)
            }
        }
    }

    async fn phase_split(&self, markdown_path: &Path) -> Result<Vec<ChunkDefinition>> {
        {
            let snap = self.snapshot.lock().await;
            if !snap.progress.chunks.is_empty() {
                return Ok(snap.progress.chunks.clone());
            }
        }

        let splitter = ChunkSplitter::new(self.config.splitter.clone());
        let chunks = splitter.split_file(markdown_path).await;
        if chunks.is_empty() {
            return Err(WorkflowError::NoContent);
        }

        let approx_length = chunks.len() * self.config.splitter.chunk_size;
        let recorded = chunks.clone();
        self.mutate(move |s| {
            s.progress.chunks = recorded;
            s.state.approx_length = approx_length;
        })
        .await?;

        Ok(chunks)
    }

    /// Populate the run's vector table. The table is in-memory, so a resumed
    /// run re-indexes unless refinement already consumed it.
    async fn phase_index(&self, chunks: &[ChunkDefinition]) -> Result<()> {
        if self.snapshot.lock().await.progress.refined {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk.read_text().await {
                Ok(text) if !text.trim().is_empty() => {
                    rows.push(IndexedChunk::new(
                        text,
                        None,
                        format!(
                            "{}:{}..{}",
                            chunk.source_path.display(),
                            chunk.start,
                            chunk.end
                        ),
                    ));
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!(
                        "Skipping unreadable chunk {}..{} during indexing: {err}",
                        chunk.start,
                        chunk.end
                    );
                }
            }
        }

        self.index.create_table(&self.run_id, rows).await?;
        Ok(())
    }

    /// Batched parallel map: extraction and requirement analysis per chunk.
    /// Chunks within a batch run concurrently; batches run strictly
    /// sequentially. Progress is persisted after every batch.
    async fn phase_map(&self, chunks: &[ChunkDefinition]) -> Result<()> {
        let batch_size = self.config.batch_size.max(1);
        let extraction = ExtractionUnit::new(self.deps.completion.clone());
        let analysis = RequirementAnalysisUnit::new(self.deps.completion.clone());

        loop {
            let next = self.snapshot.lock().await.progress.next_batch;
            if next >= chunks.len() {
                break;
            }
            let hi = (next + batch_size).min(chunks.len());
            log::info!(
                "Run {}: processing chunks {next}..{hi} of {}",
                self.run_id,
                chunks.len()
            );

            let mut extract_tasks = Vec::with_capacity(hi - next);
            let mut requirement_tasks = Vec::with_capacity(hi - next);

            for chunk in &chunks[next..hi] {
                let unit = extraction.clone();
                let chunk_def = chunk.clone();
                let unit_timeout = self.config.unit_timeout;
                extract_tasks.push(tokio::spawn(async move {
                    match timeout(unit_timeout, unit.extract(&chunk_def)).await {
                        Ok(facts) => facts,
                        Err(_) => {
                            log::warn!("Chunk extraction timed out, substituting empty result");
                            ExtractedFacts::default()
                        }
                    }
                }));

                let unit = analysis.clone();
                let chunk_def = chunk.clone();
                let unit_timeout = self.config.unit_timeout;
                requirement_tasks.push(tokio::spawn(async move {
                    match timeout(unit_timeout, unit.analyze(&chunk_def)).await {
                        Ok(items) => items,
                        Err(_) => {
                            log::warn!("Requirement analysis timed out, skipping chunk");
                            Vec::new()
                        }
                    }
                }));
            }

            // Await in spawn order so results land in chunk order; the merge
            // relies on that for its first-wins semantics.
            let mut partials = Vec::with_capacity(extract_tasks.len());
            for task in extract_tasks {
                partials.push(task.await.unwrap_or_else(|err| {
                    log::warn!("Extraction task failed: {err}");
                    ExtractedFacts::default()
                }));
            }

            let mut found = Vec::new();
            for task in requirement_tasks {
                found.extend(task.await.unwrap_or_else(|err| {
                    log::warn!("Requirement task failed: {err}");
                    Vec::new()
                }));
            }

            self.mutate(move |s| {
                s.progress.partials.extend(partials);
                s.progress.requirements.extend(found);
                s.progress.next_batch = hi;
            })
            .await?;
        }

        Ok(())
    }

    async fn phase_refine(&self) -> Result<()> {
        let (already_refined, items) = {
            let snap = self.snapshot.lock().await;
            (snap.progress.refined, snap.progress.requirements.clone())
        };
        if already_refined {
            return Ok(());
        }

        let refined = if items.is_empty() {
            items
        } else {
            let refiner = ReverseRagRefiner::new(self.index.clone(), self.run_id.clone())
                .with_min_confidence(self.config.min_confidence);
            match timeout(self.config.step_timeout, refiner.refine(items.clone())).await {
                Ok(refined) => refined,
                Err(_) => {
                    log::warn!("Refinement timed out, keeping unenriched items");
                    items
                }
            }
        };

        let for_state = refined.clone();
        self.mutate(move |s| {
            s.progress.requirements = refined;
            s.progress.refined = true;
            s.state.requirements_analysis = for_state;
        })
        .await?;
        Ok(())
    }

    /// Merge the partials and run the document-level analysis.
    async fn phase_reduce(&self) -> Result<()> {
        let (done, partials, requirements) = {
            let snap = self.snapshot.lock().await;
            (
                snap.state.extracted_data.is_some(),
                snap.progress.partials.clone(),
                snap.progress.requirements.clone(),
            )
        };
        if done {
            return Ok(());
        }

        let merged = merge_extracted(&partials);

        let analyzer = ProjectAnalyzer::new(self.deps.completion.clone());
        let enriched = match timeout(
            self.config.step_timeout,
            analyzer.analyze(merged.clone(), &requirements),
        )
        .await
        {
            Ok(enriched) => enriched,
            Err(_) => {
                log::warn!("Project analysis timed out, continuing with merged facts");
                EnrichedFacts::from(merged)
            }
        };

        let stages = if enriched.suggested_stages.is_empty() {
            self.config.default_stages.clone()
        } else {
            enriched.suggested_stages.clone()
        };
        let roles = if enriched.suggested_roles.is_empty() {
            self.config.default_roles.clone()
        } else {
            enriched.suggested_roles.clone()
        };

        self.mutate(move |s| {
            s.state.extracted_data = Some(enriched);
            s.state.suggested_stages = stages;
            s.state.suggested_roles = roles;
        })
        .await?;
        Ok(())
    }

    async fn phase_budget(&self) -> Result<()> {
        let (done, extracted, stages, roles) = {
            let snap = self.snapshot.lock().await;
            (
                snap.state.suggested_hours.is_some(),
                snap.state.extracted_data.clone(),
                snap.state.suggested_stages.clone(),
                snap.state.suggested_roles.clone(),
            )
        };
        if done {
            return Ok(());
        }
        let Some(enriched) = extracted else {
            return Ok(());
        };

        let estimator = BudgetEstimator::new(self.deps.completion.clone());
        let matrix = match timeout(
            self.config.step_timeout,
            estimator.estimate(&enriched.facts, &stages, &roles),
        )
        .await
        {
            Ok(matrix) => matrix,
            Err(_) => {
                log::warn!("Budget estimation timed out, suggesting zero matrix");
                BudgetMatrix::zeroed(&stages, &roles)
            }
        };

        self.mutate(move |s| s.state.suggested_hours = Some(matrix))
            .await?;
        Ok(())
    }

    /// True suspension at the approval gate: no polling, woken only by the
    /// signal. The approved flag is re-checked with the notification armed
    /// first, so a signal landing between the check and the await is never
    /// lost.
    async fn await_approval(&self) {
        log::info!("Run {} waiting for human approval", self.run_id);
        loop {
            let notified = self.approval.notified();
            if self.snapshot.lock().await.state.is_approved {
                break;
            }
            notified.await;
        }
    }

    async fn generate_proposal(&self) -> String {
        let (facts, budget, rates) = {
            let snap = self.snapshot.lock().await;
            match snap.approval.clone() {
                Some(approval) => (approval.updated_facts, approval.budget, approval.rates),
                None => (
                    snap.state.extracted_data.clone().unwrap_or_default(),
                    snap.state.suggested_hours.clone().unwrap_or_default(),
                    RateCard::new(),
                ),
            }
        };

        match timeout(
            self.config.step_timeout,
            self.deps.proposal.generate(&facts, &budget, &rates),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                log::error!("Proposal generation failed, substituting budget document: {err}");
                fallback_proposal(&facts, &budget, &rates)
            }
            Err(_) => {
                log::error!("Proposal generation timed out, substituting budget document");
                fallback_proposal(&facts, &budget, &rates)
            }
        }
    }

    async fn save_budget_best_effort(&self) {
        let (facts, budget) = {
            let snap = self.snapshot.lock().await;
            let facts = snap
                .approval
                .as_ref()
                .map(|a| a.updated_facts.clone())
                .or_else(|| snap.state.extracted_data.clone())
                .unwrap_or_default();
            let budget = snap
                .state
                .budget
                .clone()
                .or_else(|| snap.state.suggested_hours.clone())
                .unwrap_or_default();
            (facts, budget)
        };

        if let Err(err) = self.deps.budget_sink.save(&facts, &budget).await {
            log::error!("Budget persistence failed (run status unaffected): {err}");
        }
    }

    async fn mutate<F>(&self, mutation: F) -> Result<()>
    where
        F: FnOnce(&mut RunSnapshot),
    {
        let mut snap = self.snapshot.lock().await;
        mutation(&mut snap);
        snap.save(&self.dir).await?;
        self.state_tx.send_replace(snap.state.clone());
        Ok(())
    }
}

/// Deterministic degraded proposal: the essence plus the rendered budget
/// table, used when generation fails at the terminal step.
fn fallback_proposal(facts: &EnrichedFacts, budget: &BudgetMatrix, rates: &RateCard) -> String {
    let table = ProposalWriter::render_budget_table(budget, rates);
    format!(
        "# Commercial Proposal\n\n{}\n\n{table}",
        facts.facts.project_essence.text
    )
}

async fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fingerprint_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        tokio::fs::write(&path, "content").await.unwrap();

        let first = fingerprint_file(&path).await.unwrap();
        let second = fingerprint_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_fallback_proposal_contains_budget() {
        let mut facts = EnrichedFacts::default();
        facts.facts.project_essence.text = "Warehouse platform".to_string();

        let stages = vec!["Build".to_string()];
        let roles = vec!["Backend".to_string()];
        let budget = BudgetMatrix::zeroed(&stages, &roles);

        let text = fallback_proposal(&facts, &budget, &RateCard::new());
        assert!(text.contains("Warehouse platform"));
        assert!(text.contains("Estimated Budget"));
    }
}
