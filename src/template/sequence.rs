use super::Template;
use crate::context::RunContext;
use crate::error::TemplateResult;
use crate::session::Session;
use std::sync::Arc;

/// Runs children in order, each seeing the previous child's output.
///
/// An empty sequence returns its input unchanged. The first failing child
/// aborts the run.
#[derive(Clone)]
pub struct Sequence {
    children: Arc<[Template]>,
}

impl Sequence {
    pub fn new(children: Vec<Template>) -> Self {
        Self {
            children: Arc::from(children),
        }
    }

    pub fn builder() -> SequenceBuilder {
        SequenceBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        let mut current = session.clone();
        for (step, child) in self.children.iter().enumerate() {
            current = child.execute(&current, ctx).await.inspect_err(|e| {
                tracing::debug!(step, kind = child.kind(), error = %e, "Sequence step failed");
            })?;
        }
        Ok(current)
    }
}

#[derive(Default)]
pub struct SequenceBuilder {
    children: Vec<Template>,
}

impl SequenceBuilder {
    #[must_use]
    pub fn then(mut self, child: Template) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> Template {
        Template::Sequence(Sequence::new(self.children))
    }
}

impl From<Sequence> for Template {
    fn from(sequence: Sequence) -> Self {
        Template::Sequence(sequence)
    }
}
