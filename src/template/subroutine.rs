//! Isolated child conversations
//!
//! A subroutine runs its child template on a session derived from the
//! parent. The child's transcript is dropped unless a squash function merges
//! selected results back.

use super::Template;
use crate::context::RunContext;
use crate::error::TemplateResult;
use crate::session::Session;
use std::sync::Arc;

type InitFn = Arc<dyn Fn(&Session) -> Session + Send + Sync>;
type SquashFn = Arc<dyn Fn(&Session, &Session) -> Session + Send + Sync>;

#[derive(Clone)]
pub struct Subroutine {
    child: Arc<Template>,
    init: InitFn,
    squash: Option<SquashFn>,
}

impl Subroutine {
    pub fn builder(child: Template) -> SubroutineBuilder {
        SubroutineBuilder {
            child,
            init: None,
            squash: None,
        }
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        let child_session = (self.init)(session);
        let finished = self.child.execute(&child_session, ctx).await?;
        tracing::debug!(
            child_messages = finished.len(),
            squash = self.squash.is_some(),
            "Subroutine finished"
        );
        Ok(match &self.squash {
            Some(squash) => squash(session, &finished),
            None => session.clone(),
        })
    }
}

impl From<Subroutine> for Template {
    fn from(subroutine: Subroutine) -> Self {
        Template::Subroutine(subroutine)
    }
}

pub struct SubroutineBuilder {
    child: Template,
    init: Option<InitFn>,
    squash: Option<SquashFn>,
}

impl SubroutineBuilder {
    /// Derive the child's starting session; defaults to [`init::fresh`]
    #[must_use]
    pub fn init(mut self, init: impl Fn(&Session) -> Session + Send + Sync + 'static) -> Self {
        self.init = Some(Arc::new(init));
        self
    }

    /// Merge the finished child back into the parent
    #[must_use]
    pub fn squash(
        mut self,
        squash: impl Fn(&Session, &Session) -> Session + Send + Sync + 'static,
    ) -> Self {
        self.squash = Some(Arc::new(squash));
        self
    }

    pub fn build(self) -> Template {
        Template::Subroutine(Subroutine {
            child: Arc::new(self.child),
            init: self.init.unwrap_or_else(|| Arc::new(init::fresh)),
            squash: self.squash,
        })
    }
}

/// Common `init` functions
pub mod init {
    use crate::session::{Attributes, Session};

    /// Empty session, nothing inherited
    pub fn fresh(_parent: &Session) -> Session {
        Session::new()
    }

    /// Empty transcript carrying the listed parent attributes
    pub fn inherit<I, S>(keys: I) -> impl Fn(&Session) -> Session + Send + Sync + 'static
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        move |parent| {
            let attributes: Attributes = keys
                .iter()
                .filter_map(|key| parent.attribute(key).map(|v| (key.clone(), v.clone())))
                .collect();
            Session::with_attributes(attributes)
        }
    }

    /// Copy of the parent, transcript included
    pub fn clone_parent(parent: &Session) -> Session {
        parent.clone()
    }
}

/// Common `squash` functions
pub mod squash {
    use crate::session::{Attributes, Session};

    /// Append the child's final message to the parent
    pub fn append_last_message(parent: &Session, child: &Session) -> Session {
        match child.last_message() {
            Some(message) => parent.add_message(message.clone()),
            None => parent.clone(),
        }
    }

    /// Merge the listed child attributes into the parent
    pub fn copy_attributes<I, S>(
        keys: I,
    ) -> impl Fn(&Session, &Session) -> Session + Send + Sync + 'static
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        move |parent, child| {
            let partial: Attributes = keys
                .iter()
                .filter_map(|key| child.attribute(key).map(|v| (key.clone(), v.clone())))
                .collect();
            parent.update_metadata(partial)
        }
    }
}
