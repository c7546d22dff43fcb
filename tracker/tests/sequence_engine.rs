//! Engine-level tests that cross module boundaries: legacy failure
//! attachment to the calling method context and detached execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracker::sequence::{Sequence, SequenceError, SequenceFailure, Timer};
use tracker::test_support::ContextFixture;

struct NeverPasses {
    attach_failure: bool,
}

impl Sequence for NeverPasses {
    type Output = ();

    fn run(&mut self) -> Result<(), SequenceFailure> {
        Err(SequenceFailure::transient(anyhow!("element not visible")))
    }

    fn add_failure_to_method_context(&self) -> bool {
        self.attach_failure
    }
}

#[test]
fn legacy_flag_attaches_last_failure_to_method_context() {
    let fixture = ContextFixture::new();
    let method = fixture.test_method("test_wait");

    let mut timer = Timer::new(Duration::from_millis(50), Duration::from_millis(200))
        .with_method_context(Arc::clone(&method));
    let result = timer.execute_sequence(&mut NeverPasses {
        attach_failure: true,
    });
    assert!(matches!(result, Err(SequenceError::Timeout(_))));

    assert!(method.has_failed_assertions());
    let recorded = method.with_steps(|steps| {
        steps
            .read_errors()
            .map(|e| e.error().to_string())
            .collect::<Vec<_>>()
    });
    assert_eq!(recorded, vec!["element not visible"]);
}

#[test]
fn without_legacy_flag_nothing_is_attached() {
    let fixture = ContextFixture::new();
    let method = fixture.test_method("test_wait");

    let mut timer = Timer::new(Duration::from_millis(50), Duration::from_millis(200))
        .with_method_context(Arc::clone(&method));
    let result = timer.execute_sequence(&mut NeverPasses {
        attach_failure: false,
    });
    assert!(matches!(result, Err(SequenceError::Timeout(_))));
    assert!(!method.has_failed_assertions());
}

#[test]
fn detached_sequence_logs_timeout_and_finishes() {
    let timer = Timer::new(Duration::from_millis(50), Duration::from_millis(200));
    let handle = timer
        .execute_sequence_detached(NeverPasses {
            attach_failure: false,
        })
        .expect("spawn");

    // The loop exhausts its 200 ms budget on its own; join must return.
    handle.join();
}
