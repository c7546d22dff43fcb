//! Context-tree level tests: index allocation, session linking, traceability
//! references and identity semantics under concurrent mutation.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tracker::context::{MethodType, SessionContext, SessionRequest, Status};
use tracker::controller::ExecutionController;
use tracker::events::EventBus;
use tracker::test_support::ContextFixture;

#[test]
fn concurrent_method_starts_get_unique_gapless_run_indices() {
    let controller = Arc::new(ExecutionController::new("suite"));
    let threads: usize = 8;
    let per_thread: usize = 50;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                (0..per_thread)
                    .map(|i| {
                        controller
                            .start_method(
                                &format!("Class{t}"),
                                &format!("method_{i}"),
                                MethodType::TestMethod,
                                vec![],
                            )
                            .run_index()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut indices: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("join"))
        .collect();
    indices.sort_unstable();

    let expected: Vec<usize> = (1..=threads * per_thread).collect();
    assert_eq!(indices, expected, "no duplicates, no gaps");
}

#[test]
fn add_session_context_is_idempotent() {
    let fixture = ContextFixture::new();
    let events = EventBus::new();
    let method = fixture.test_method("test_login");
    let session = SessionContext::new(&SessionRequest::new("shared"));

    method.add_session_context(&session, &events);
    method.add_session_context(&session, &events);

    assert_eq!(method.read_session_contexts().len(), 1);
    assert_eq!(session.read_method_contexts().len(), 1);
}

#[test]
fn session_method_list_survives_concurrent_linking() {
    let fixture = ContextFixture::new();
    let session = SessionContext::new(&SessionRequest::new("shared"));
    let methods: Vec<_> = (0..16)
        .map(|i| fixture.test_method(&format!("method_{i}")))
        .collect();

    let handles: Vec<_> = methods
        .iter()
        .map(|method| {
            let method = Arc::clone(method);
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let events = EventBus::new();
                method.add_session_context(&session, &events);
                // Repeated link from the same method stays a no-op.
                method.add_session_context(&session, &events);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }

    let linked = session.read_method_contexts();
    assert_eq!(linked.len(), 16);
    let unique: HashSet<usize> = linked.iter().map(|m| m.run_index()).collect();
    assert_eq!(unique.len(), 16, "each method appears exactly once");
    for method in &methods {
        assert_eq!(method.read_session_contexts().len(), 1);
    }
}

#[test]
fn depends_on_deduplicates_but_related_does_not() {
    let fixture = ContextFixture::new();
    let method = fixture.test_method("dependent");
    let other = fixture.test_method("dependency");

    method.add_depends_on_method(Arc::clone(&other));
    method.add_depends_on_method(Arc::clone(&other));
    assert_eq!(method.read_depends_on_method_contexts().len(), 1);

    method.add_related_method_context(Arc::clone(&other));
    method.add_related_method_context(Arc::clone(&other));
    assert_eq!(method.read_related_method_contexts().len(), 2);
}

#[test]
fn identity_is_stable_across_unrelated_mutations() {
    let fixture = ContextFixture::new();
    let method = fixture.test_method("test_checkout");
    let identity = method.identity();

    method.add_info("retried once");
    method.set_status(Status::Failed);
    method.set_retry_number(2);
    method.add_priority_message("needs attention");

    assert_eq!(method.identity(), identity);
    assert_eq!(method.to_string(), identity);
}

#[test]
fn equality_is_identity_not_state() {
    let fixture = ContextFixture::new();
    let first = fixture.test_method("same_name");
    let second = fixture.test_method("same_name");

    // Same name, different run index: different identities.
    assert_ne!(*first, *second);
    assert_eq!(*first, *first.clone());
}

#[test]
fn priority_message_deduplicates_by_containment() {
    let fixture = ContextFixture::new();
    let method = fixture.test_method("test");

    method.add_priority_message("timeout in step 3");
    method.add_priority_message("timeout in step 3");
    method.add_priority_message("step 3");

    assert_eq!(
        method.priority_message().as_deref(),
        Some("timeout in step 3")
    );
}

#[test]
fn attributes_resolve_by_type() {
    #[derive(Debug, PartialEq)]
    struct RetryTolerant {
        max_retries: u32,
    }

    let fixture = ContextFixture::new();
    let method = fixture.test_method("flaky");
    assert!(method.get_attribute::<RetryTolerant>().is_none());

    method.add_attribute(RetryTolerant { max_retries: 3 });
    let marker = method.get_attribute::<RetryTolerant>().expect("attribute");
    assert_eq!(marker.max_retries, 3);
}

#[test]
fn exclusive_sessions_are_marked_by_prefix() {
    let exclusive = SessionContext::new(&SessionRequest::new("EXCLUSIVE_worker"));
    let shared = SessionContext::new(&SessionRequest::new("worker"));
    assert!(exclusive.is_exclusive());
    assert!(!shared.is_exclusive());
}

#[test]
fn session_request_is_defensively_copied() {
    let mut request = SessionRequest::new("original");
    let session = SessionContext::new(&request);

    request.session_key = "mutated".to_string();
    request.browser_name = Some("chrome".to_string());

    assert_eq!(session.session_key(), "original");
    assert_eq!(session.request().session_key, "original");
    assert_eq!(session.request().browser_name, None);
}
