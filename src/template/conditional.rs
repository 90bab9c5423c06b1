use super::{Predicate, Template};
use crate::context::RunContext;
use crate::error::TemplateResult;
use crate::session::Session;
use std::sync::Arc;

/// Two-way branch on a session predicate.
///
/// Without an `else` branch a false predicate returns the input unchanged.
/// Switch-style dispatch is a chain of nested conditionals.
#[derive(Clone)]
pub struct Conditional {
    predicate: Predicate,
    then: Arc<Template>,
    otherwise: Option<Arc<Template>>,
}

impl Conditional {
    pub fn new(
        predicate: impl Fn(&Session) -> bool + Send + Sync + 'static,
        then: Template,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            then: Arc::new(then),
            otherwise: None,
        }
    }

    #[must_use]
    pub fn otherwise(mut self, otherwise: Template) -> Self {
        self.otherwise = Some(Arc::new(otherwise));
        self
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        if (self.predicate)(session) {
            return self.then.execute(session, ctx).await;
        }
        match &self.otherwise {
            Some(otherwise) => otherwise.execute(session, ctx).await,
            None => Ok(session.clone()),
        }
    }
}

impl From<Conditional> for Template {
    fn from(conditional: Conditional) -> Self {
        Template::Conditional(conditional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::attribute_equals;
    use serde_json::json;

    fn route() -> Template {
        Conditional::new(
            attribute_equals("lang", json!("fr")),
            Template::assistant_text("bonjour"),
        )
        .otherwise(
            Conditional::new(
                attribute_equals("lang", json!("de")),
                Template::assistant_text("hallo"),
            )
            .into(),
        )
        .into()
    }

    #[tokio::test]
    async fn nested_dispatch() {
        let ctx = RunContext::default();
        for (lang, expected) in [("fr", Some("bonjour")), ("de", Some("hallo")), ("en", None)] {
            let session = Session::new().set_attribute("lang", json!(lang));
            let out = route().execute(&session, &ctx).await.unwrap();
            assert_eq!(out.last_message().map(|m| m.content()), expected, "{lang}");
        }
    }
}
