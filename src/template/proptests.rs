//! Property-based tests for template execution
//!
//! Trees are generated from deterministic building blocks so every run can
//! be replayed and compared.

use super::*;
use crate::content::CallbackSource;
use crate::guardrail::Guardrail;
use crate::session::Message;
use crate::validate::FnValidator;
use proptest::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// Test Helpers
// ============================================================================

fn run(template: &Template, session: &Session) -> TemplateResult<Session> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(template.execute(session, &RunContext::default()))
}

fn even_length(session: &Session) -> bool {
    session.len() % 2 == 0
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ?!]{0,20}"
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        arb_text().prop_map(Message::system),
        arb_text().prop_map(Message::user),
        arb_text().prop_map(Message::assistant),
    ]
}

fn arb_session() -> impl Strategy<Value = Session> {
    (proptest::collection::vec(arb_message(), 0..6), any::<bool>()).prop_map(|(messages, flag)| {
        let session = Session::new().set_attribute("flag", json!(flag));
        session.extend_messages(&messages)
    })
}

fn arb_leaf() -> impl Strategy<Value = Template> {
    prop_oneof![
        arb_text().prop_map(Template::system),
        arb_text().prop_map(Template::user_text),
        arb_text().prop_map(Template::assistant_text),
        Just(Template::tool_results()),
    ]
}

fn arb_template() -> impl Strategy<Value = Template> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Template::sequence),
            (inner.clone(), inner.clone()).prop_map(|(then, otherwise)| {
                Conditional::new(attribute_equals("flag", json!(true)), then)
                    .otherwise(otherwise)
                    .into()
            }),
            (inner.clone(), 0u32..4).prop_map(|(body, max)| {
                Loop::builder().body(body).condition(even_length).max_iterations(max).build()
            }),
            inner.clone().prop_map(|child| {
                Subroutine::builder(child)
                    .init(init::clone_parent)
                    .squash(squash::append_last_message)
                    .build()
            }),
        ]
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Executing never changes the input session or its message buffer
    #[test]
    fn prop_execute_leaves_input_untouched(template in arb_template(), session in arb_session()) {
        let snapshot = session.clone();
        let buffer = session.messages().as_ptr();

        let _ = run(&template, &session);

        prop_assert_eq!(&session, &snapshot);
        prop_assert_eq!(session.messages().as_ptr(), buffer);
    }

    // Sequence([a, b]) behaves exactly like running a then b
    #[test]
    fn prop_sequence_composes(a in arb_template(), b in arb_template(), session in arb_session()) {
        let composed = run(&Template::sequence([a.clone(), b.clone()]), &session).ok();
        let stepwise = run(&a, &session).ok().and_then(|mid| run(&b, &mid).ok());
        prop_assert_eq!(composed, stepwise);
    }

    // Exactly one branch runs; a missing else is the identity
    #[test]
    fn prop_conditional_takes_one_branch(session in arb_session(), with_else in any::<bool>()) {
        let mut branch = Conditional::new(even_length, Template::assistant_text("THEN"));
        if with_else {
            branch = branch.otherwise(Template::assistant_text("ELSE"));
        }
        let out = run(&branch.into(), &session).unwrap();

        if even_length(&session) {
            prop_assert_eq!(out.len(), session.len() + 1);
            prop_assert_eq!(out.last_message().map(Message::content), Some("THEN"));
        } else if with_else {
            prop_assert_eq!(out.len(), session.len() + 1);
            prop_assert_eq!(out.last_message().map(Message::content), Some("ELSE"));
        } else {
            prop_assert_eq!(&out, &session);
        }
    }

    // A condition that never stops runs the body exactly max_iterations times
    #[test]
    fn prop_loop_is_bounded(max in 0u32..12, until in any::<bool>()) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let body = AssistantTemplate::builder()
            .source(CallbackSource::from_fn(move |_s: &Session| {
                counter.fetch_add(1, Ordering::SeqCst);
                "again"
            }))
            .build()
            .unwrap();

        let builder = Loop::builder().body(body).max_iterations(max);
        let template = if until {
            builder.exit_when(|_| false).build()
        } else {
            builder.loop_while(|_| true).build()
        };

        let out = run(&template, &Session::new()).unwrap();
        prop_assert_eq!(calls.load(Ordering::SeqCst), max);
        prop_assert_eq!(out.len(), max as usize);
    }

    // k rejections then acceptance costs exactly k + 1 invocations
    #[test]
    fn prop_guardrail_accepts_after_k_failures(k in 0u32..5, slack in 1u32..4) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let source = CallbackSource::from_fn(move |_s: &Session| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < k { format!("draft {n}") } else { "final".to_string() }
        });
        let template = AssistantTemplate::builder()
            .source(source)
            .guardrail(
                Guardrail::new(FnValidator::predicate(|t| t == "final", "finish"))
                    .max_attempts(k + slack),
            )
            .build()
            .unwrap();

        let out = run(&template, &Session::new()).unwrap();
        prop_assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        prop_assert_eq!(out.messages(), &[Message::assistant("final")]);
    }

    // Without squash the parent comes back unchanged
    #[test]
    fn prop_subroutine_isolates_child(child in arb_template(), session in arb_session()) {
        let template = Subroutine::builder(child).init(init::clone_parent).build();
        if let Ok(out) = run(&template, &session) {
            prop_assert_eq!(&out, &session);
        }
    }
}
