use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::types::{GroundedAnswer, SaveOutcome, SaveRequest, ScoredQa};
use crate::core::config::{AppConfig, ExtractionConfig, IndexConfig};
use crate::core::errors::QaError;
use crate::embedding::Embedder;
use crate::extraction::fallback::{scan_answer, scan_question};
use crate::extraction::{Dialog, ModelExtractor, QaExtractor, Role, ValidatedQaPair};
use crate::index::{VectorIndex, WorkspaceScope};
use crate::llm::LlmProvider;
use crate::persistence::{QaRecord, QaRecordStore};
use crate::quality::QualityValidator;
use crate::rag::{Evidence, GroundedResponder};

pub struct QaService {
    extractor: Arc<dyn QaExtractor>,
    validator: QualityValidator,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn QaRecordStore>,
    responder: GroundedResponder,
    extraction: ExtractionConfig,
    retrieval: IndexConfig,
}

impl QaService {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn QaRecordStore>,
    ) -> Self {
        Self {
            extractor: Arc::new(ModelExtractor::new(
                provider.clone(),
                config.extraction.clone(),
            )),
            validator: QualityValidator::new(config.quality.clone()),
            embedder,
            index,
            store,
            responder: GroundedResponder::new(provider, config.responder.clone()),
            extraction: config.extraction.clone(),
            retrieval: config.index.clone(),
        }
    }

    /// Replaces the model-backed extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn QaExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn model_available(&self) -> bool {
        self.extractor.is_available().await
    }

    pub fn index_backend(&self) -> &str {
        self.index.name()
    }

    pub async fn save(
        &self,
        scope: &WorkspaceScope,
        request: SaveRequest,
    ) -> Result<SaveOutcome, QaError> {
        if request.dialog.is_empty() {
            return Err(QaError::NoExtractablePair);
        }

        if let Some(existing) = self.store.get(scope.as_str(), request.ticket_id).await? {
            tracing::info!(
                "Ticket {} already saved in workspace {}",
                request.ticket_id,
                scope
            );
            return Ok(SaveOutcome::AlreadySaved(existing));
        }

        let pair = self.extract_pair(&request.dialog).await?;
        let vector = self.embedder.embed(&pair.question).await?;

        self.index
            .upsert(
                scope,
                request.ticket_id,
                vector,
                json!({
                    "question": pair.question,
                    "answer": pair.answer,
                    "quality_score": pair.quality_score,
                }),
            )
            .await?;

        let record = QaRecord {
            workspace: scope.as_str().to_string(),
            ticket_id: request.ticket_id,
            question: pair.question.clone(),
            answer: pair.answer.clone(),
            source: serde_json::to_value(&request).map_err(QaError::persistence)?,
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.save(&record).await {
            // keep the index in step with the store; a re-save also overwrites the point
            if let Err(cleanup) = self.index.remove(scope, request.ticket_id).await {
                tracing::error!(
                    "Ticket {} in workspace {} left an orphan vector: {}",
                    request.ticket_id,
                    scope,
                    cleanup
                );
            }
            return Err(err);
        }

        tracing::info!(
            "Saved ticket {} in workspace {} (quality {:.2})",
            request.ticket_id,
            scope,
            pair.quality_score
        );
        Ok(SaveOutcome::Saved(pair))
    }

    pub async fn search(
        &self,
        scope: &WorkspaceScope,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredQa>, QaError> {
        let top_k = top_k
            .unwrap_or(self.retrieval.default_top_k)
            .clamp(1, self.retrieval.max_top_k.max(1));

        let vector = self.embedder.embed(query.trim()).await?;
        let hits = self
            .index
            .search(scope, &vector, top_k, self.retrieval.score_threshold)
            .await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<u64> = hits.iter().map(|hit| hit.ticket_id).collect();
        let records: HashMap<u64, QaRecord> = self
            .store
            .get_many(scope.as_str(), &ids)
            .await?
            .into_iter()
            .map(|record| (record.ticket_id, record))
            .collect();

        let results: Vec<ScoredQa> = hits
            .into_iter()
            .filter_map(|hit| {
                let record = records.get(&hit.ticket_id)?;
                Some(ScoredQa {
                    ticket_id: hit.ticket_id,
                    question: record.question.clone(),
                    answer: record.answer.clone(),
                    similarity: hit.score,
                })
            })
            .collect();

        tracing::debug!("Search in {} returned {} results", scope, results.len());
        Ok(results)
    }

    pub async fn answer(
        &self,
        scope: &WorkspaceScope,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<GroundedAnswer, QaError> {
        let query = query.trim();
        let results = self.search(scope, query, top_k).await?;
        let evidence: Vec<Evidence> = results
            .into_iter()
            .map(|r| Evidence {
                ticket_id: r.ticket_id,
                question: r.question,
                answer: r.answer,
                score: r.similarity,
            })
            .collect();

        let answer = self.responder.answer(query, &evidence).await?;
        let sources = self
            .responder
            .select_evidence(&evidence)
            .into_iter()
            .map(|e| ScoredQa {
                ticket_id: e.ticket_id,
                question: e.question.clone(),
                answer: e.answer.clone(),
                similarity: e.score,
            })
            .collect();

        Ok(GroundedAnswer {
            query: query.to_string(),
            answer,
            sources,
        })
    }

    /// Tries each extraction strategy in turn; the first pair that passes
    /// the quality gate wins.
    async fn extract_pair(&self, dialog: &Dialog) -> Result<ValidatedQaPair, QaError> {
        let mut outage: Option<QaError> = None;
        let mut candidates: Vec<(String, String, &'static str)> = Vec::new();

        if let Some((question, answer)) = self.staged_pair(dialog, &mut outage).await {
            candidates.push((question, answer, "model"));
        }
        if self.extraction.rule_based_fallback {
            if let Some((question, answer)) = self.scanned_pair(dialog) {
                if !candidates.iter().any(|(q, a, _)| *q == question && *a == answer) {
                    candidates.push((question, answer, "dialog scan"));
                }
            }
        }

        for (question, answer, strategy) in candidates {
            let report = self.validator.validate(&question, &answer);
            if report.is_valid {
                tracing::debug!(
                    "Extracted pair via {} (quality {:.2})",
                    strategy,
                    report.quality_score
                );
                return Ok(ValidatedQaPair {
                    question: question.trim().to_string(),
                    answer: answer.trim().to_string(),
                    quality_score: report.quality_score,
                    issues: report.issues,
                });
            }
            tracing::debug!("Pair from {} rejected: {:?}", strategy, report.issues);
        }

        match outage {
            Some(err) => {
                tracing::error!("Extraction failed with model backend down: {}", err);
                Err(err)
            }
            None => Err(QaError::NoExtractablePair),
        }
    }

    /// Question then answer, each from the model with the dialog scan
    /// filling in when the model gives nothing usable.
    async fn staged_pair(
        &self,
        dialog: &Dialog,
        outage: &mut Option<QaError>,
    ) -> Option<(String, String)> {
        let cfg = &self.extraction;

        let from_model = match self.extractor.extract_question(dialog).await {
            Ok(Some(candidate)) if candidate.confidence >= cfg.min_question_confidence => {
                Some(candidate)
            }
            Ok(Some(candidate)) => {
                tracing::debug!(
                    "Question confidence {:.2} below {:.2}",
                    candidate.confidence,
                    cfg.min_question_confidence
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("Question extraction failed, falling back: {}", err);
                *outage = Some(err);
                None
            }
        };
        let candidate = from_model.or_else(|| {
            cfg.rule_based_fallback
                .then(|| scan_question(dialog, cfg.rule_based_confidence))
                .flatten()
        })?;
        let question = candidate.question.filter(|q| !q.trim().is_empty())?;

        let position = candidate
            .position
            .filter(|p| {
                dialog
                    .turns()
                    .get(*p)
                    .is_some_and(|turn| turn.role == Role::User)
            })
            .or_else(|| dialog.position_of_question(&question))
            .or_else(|| scan_question(dialog, 0.0).and_then(|c| c.position));

        // skip a second round trip once the backend is known to be down
        let from_model = if outage.is_some() {
            None
        } else {
            match self.extractor.extract_answer(&question, dialog).await {
                Ok(Some(candidate)) if candidate.relevance >= cfg.min_answer_relevance => {
                    Some(candidate)
                }
                Ok(Some(candidate)) => {
                    tracing::debug!(
                        "Answer relevance {:.2} below {:.2}",
                        candidate.relevance,
                        cfg.min_answer_relevance
                    );
                    None
                }
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!("Answer extraction failed, falling back: {}", err);
                    *outage = Some(err);
                    None
                }
            }
        };
        let answer = from_model
            .or_else(|| {
                cfg.rule_based_fallback
                    .then(|| scan_answer(dialog, position, cfg.rule_based_confidence))
                    .flatten()
            })?
            .answer
            .filter(|a| !a.trim().is_empty())?;

        Some((question, answer))
    }

    fn scanned_pair(&self, dialog: &Dialog) -> Option<(String, String)> {
        let confidence = self.extraction.rule_based_confidence;
        let question = scan_question(dialog, confidence)?;
        let answer = scan_answer(dialog, question.position, confidence)?;
        Some((question.question?, answer.answer?))
    }
}
