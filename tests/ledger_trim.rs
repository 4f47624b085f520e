// tests/ledger_trim.rs
use ticker_sentiment_worker::ingest::ledger::DedupLedger;

#[test]
fn exceeding_the_ceiling_keeps_the_most_recent_half() {
    let mut ledger = DedupLedger::new(5000);
    ledger.mark_batch("SPY", (0..5001).map(|i| format!("reddit_{i}")));
    assert_eq!(ledger.len("SPY"), 5001);

    let kept = ledger.trim_if_needed("SPY").expect("trim should fire");
    assert_eq!(kept, 2500);
    assert_eq!(ledger.len("SPY"), 2500);

    // Everything trimmed out answers false, the recent half answers true.
    for i in 0..2501 {
        assert!(!ledger.has("SPY", &format!("reddit_{i}")), "id {i} should be gone");
    }
    for i in 2501..5001 {
        assert!(ledger.has("SPY", &format!("reddit_{i}")), "id {i} should remain");
    }
}

#[test]
fn marking_is_idempotent_per_ticker() {
    let mut ledger = DedupLedger::new(100);
    ledger.mark_batch("SPY", ["a".to_string(), "a".to_string(), "b".to_string()]);
    assert_eq!(ledger.len("SPY"), 2);

    // Same IDs under another ticker are independent.
    assert!(!ledger.has("QQQ", "a"));
    ledger.mark_batch("QQQ", ["a".to_string()]);
    assert_eq!(ledger.len("QQQ"), 1);
}
