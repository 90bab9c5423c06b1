//! Concurrent fan-out over content sources

use super::Template;
use crate::content::{ContentSource, GenerativeSource};
use crate::context::RunContext;
use crate::error::TemplateResult;
use crate::llm::GenerationOptions;
use crate::session::Session;
use futures::future::{join_all, FutureExt};
use std::sync::Arc;

pub type Scorer = Arc<dyn Fn(&Session) -> f64 + Send + Sync>;
pub type Reducer = Arc<dyn Fn(&Session, Vec<Session>) -> Session + Send + Sync>;

/// How successful branches are folded back into one session
#[derive(Clone, Default)]
pub enum Aggregation {
    /// Append every branch's new messages to the base session
    #[default]
    KeepAll,
    /// Keep the single highest-scoring branch; ties go to the earlier branch
    Best(Scorer),
    /// Hand the base session and every branch to a reducer
    Custom(Reducer),
}

impl std::fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Aggregation::KeepAll => "KeepAll",
            Aggregation::Best(_) => "Best",
            Aggregation::Custom(_) => "Custom",
        })
    }
}

/// Issues every configured repetition of every source concurrently against
/// the same input session. Each success becomes an assistant message on its
/// own copy of the input; failures are logged and dropped.
#[derive(Clone)]
pub struct Parallel {
    sources: Vec<(Arc<dyn ContentSource>, u32)>,
    aggregation: Aggregation,
}

impl Parallel {
    pub fn builder() -> ParallelBuilder {
        ParallelBuilder::default()
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        let mut branches = Vec::new();
        for (index, (source, repetitions)) in self.sources.iter().enumerate() {
            for repetition in 0..*repetitions {
                branches.push(
                    async move {
                        let result = source.get_content(session, ctx).await;
                        (index, repetition, result)
                    }
                    .boxed(),
                );
            }
        }

        let mut results = Vec::new();
        for (source, repetition, result) in join_all(branches).await {
            match result {
                Ok(content) => results.push(session.add_message(content.to_assistant_message())),
                Err(e) => tracing::warn!(source, repetition, error = %e, "Parallel branch failed"),
            }
        }

        if results.is_empty() {
            tracing::warn!(sources = self.sources.len(), "All parallel branches failed");
            return Ok(session.clone());
        }

        Ok(match &self.aggregation {
            Aggregation::KeepAll => {
                let base_len = session.len();
                session.extend_messages(
                    results
                        .iter()
                        .flat_map(|r| r.messages().iter().skip(base_len)),
                )
            }
            Aggregation::Best(scorer) => {
                let mut best: Option<(f64, Session)> = None;
                for candidate in results {
                    let score = scorer(&candidate);
                    if best.as_ref().map_or(true, |(top, _)| score.total_cmp(top).is_gt()) {
                        best = Some((score, candidate));
                    }
                }
                best.map_or_else(|| session.clone(), |(_, winner)| winner)
            }
            Aggregation::Custom(reducer) => reducer(session, results),
        })
    }
}

impl From<Parallel> for Template {
    fn from(parallel: Parallel) -> Self {
        Template::Parallel(parallel)
    }
}

#[derive(Default)]
pub struct ParallelBuilder {
    sources: Vec<(Arc<dyn ContentSource>, u32)>,
    aggregation: Aggregation,
}

impl ParallelBuilder {
    /// Run `source` `repetitions` times
    #[must_use]
    pub fn source(mut self, source: impl ContentSource + 'static, repetitions: u32) -> Self {
        self.sources.push((Arc::new(source), repetitions));
        self
    }

    #[must_use]
    pub fn source_arc(mut self, source: Arc<dyn ContentSource>, repetitions: u32) -> Self {
        self.sources.push((source, repetitions));
        self
    }

    /// Generation with `options`, `repetitions` times
    #[must_use]
    pub fn generate(self, options: GenerationOptions, repetitions: u32) -> Self {
        self.source(GenerativeSource::new(options), repetitions)
    }

    #[must_use]
    pub fn keep_all(mut self) -> Self {
        self.aggregation = Aggregation::KeepAll;
        self
    }

    #[must_use]
    pub fn best(mut self, scorer: impl Fn(&Session) -> f64 + Send + Sync + 'static) -> Self {
        self.aggregation = Aggregation::Best(Arc::new(scorer));
        self
    }

    #[must_use]
    pub fn custom(
        mut self,
        reducer: impl Fn(&Session, Vec<Session>) -> Session + Send + Sync + 'static,
    ) -> Self {
        self.aggregation = Aggregation::Custom(Arc::new(reducer));
        self
    }

    pub fn build(self) -> Template {
        Template::Parallel(Parallel {
            sources: self.sources,
            aggregation: self.aggregation,
        })
    }
}
