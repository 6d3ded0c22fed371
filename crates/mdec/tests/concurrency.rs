//! Parallel and repeated requests against one session.

mod common;

use std::thread;

use common::*;
use mdec::{DecompileOutcome, DecompilerConfig, FunctionId};

#[test]
fn test_parallel_requests_match_sequential() {
    let session = session();
    let init = function_id(&session, "ragUnk0::Init");
    let destroy = function_id(&session, "ragUnk0::Destroy");
    let expected = [
        session.decompile_function(init),
        session.decompile_function(destroy),
    ];
    session.clear_cache();

    let session = session.with_config(DecompilerConfig::new().with_jobs(4));
    let ids: Vec<FunctionId> = (0..8).map(|n| if n % 2 == 0 { init } else { destroy }).collect();
    let outcomes = session.decompile_functions(&ids);
    for (n, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome, &expected[n % 2]);
    }
    assert_eq!(session.cached_functions(), 2);
}

#[test]
fn test_same_function_from_many_threads() {
    let session = session();
    let init = function_id(&session, "ragUnk0::Init");
    let outcomes: Vec<DecompileOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| scope.spawn(|| session.decompile_function(init)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(outcomes.iter().all(DecompileOutcome::is_success));
    assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(session.cached_functions(), 1);
}

#[test]
fn test_failures_do_not_poison_other_requests() {
    let session = session();
    let init = function_id(&session, "ragUnk0::Init");
    let outcomes = session.decompile_functions(&[FunctionId(1000), init, FunctionId(1001)]);
    assert_eq!(outcomes[0].error(), Some("Unknown function fn#1000"));
    assert!(outcomes[1].is_success());
    assert!(outcomes[2].error().is_some());
}
