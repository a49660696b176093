//! Cancellation from another thread.

use sigscan_rs::{
    AbortReason, Limits, LiteralMatcher, PatternSpec, ScanOptions, ScanState, Scanner,
};
use std::ops::ControlFlow;
use std::sync::mpsc;
use std::thread;

use crate::{build, literal};

#[test]
fn cancel_from_other_thread() {
    let rules = build(Limits::default(), vec![literal("ab", b"ab")]);
    let mut scanner = Scanner::new(&rules)
        .expect("scanner")
        .with_options(ScanOptions {
            chunk_size: 1024,
            ..ScanOptions::default()
        });
    let token = scanner.cancel_token();
    let data = b"ab".repeat(1 << 20);

    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (cancelled_tx, cancelled_rx) = mpsc::channel::<()>();
    let canceller = thread::spawn(move || {
        started_rx.recv().expect("scan started");
        token.cancel();
        cancelled_tx.send(()).expect("report cancel");
    });

    let mut first = true;
    let state = scanner.scan_with(&data, |_| {
        if first {
            first = false;
            started_tx.send(()).expect("signal start");
            // Hold this chunk until the other thread has cancelled.
            cancelled_rx.recv().expect("cancel done");
        }
        ControlFlow::Continue(())
    });
    canceller.join().expect("canceller");

    assert_eq!(state, ScanState::Aborted(AbortReason::Cancelled));
    assert!(scanner.results().stats().bytes_scanned <= 1024);
    assert_eq!(scanner.results().total_matches(), 0);
}

#[test]
fn partial_matches_kept_on_request() {
    let rules = build(
        Limits::default(),
        vec![PatternSpec::literal("ab", LiteralMatcher::new(b"ab"))],
    );
    let mut scanner = Scanner::new(&rules)
        .expect("scanner")
        .with_options(ScanOptions {
            chunk_size: 8,
            retain_partial_matches: true,
            ..ScanOptions::default()
        });
    let token = scanner.cancel_token();
    let data = b"ab".repeat(100);
    let state = scanner.scan_with(&data, |_| {
        token.cancel();
        ControlFlow::Continue(())
    });
    assert_eq!(state, ScanState::Aborted(AbortReason::Cancelled));
    // The first chunk completes before cancellation is observed.
    assert_eq!(scanner.results().total_matches(), 4);
}
