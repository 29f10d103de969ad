mod common;

use std::sync::Arc;

use acq_dash::error::RetryPolicy;
use acq_dash::fetcher::{FetchError, MessageFetcher};
use acq_dash::slack::SlackError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{page, slack_msg, StubSlack};
use serde_json::json;

const CHANNEL: &str = "C0123";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 10, 15, 0, 0).unwrap()
}

fn fetcher(stub: &Arc<StubSlack>) -> MessageFetcher {
    MessageFetcher::new(stub.clone()).with_retry_policy(RetryPolicy::immediate(4))
}

#[tokio::test]
async fn test_keyword_and_window_scenario() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(
                None,
                page(
                    vec![
                        slack_msg(t - Duration::hours(1), "U1", "ai_acq follow-up"),
                        slack_msg(t - Duration::hours(2), "U2", "unrelated"),
                        slack_msg(t - Duration::hours(10), "U1", "weekly ai_acq update for the team"),
                    ],
                    None,
                ),
            )
            .with_user("U1", "Hannah Park")
            .with_user("U2", "Omar Diaz"),
    );

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(3), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, t - Duration::hours(1));
    assert_eq!(records[0].author, "Hannah Park");
    assert_eq!(records[0].user_id, "U1");
    assert_eq!(records[0].text, "ai_acq follow-up");
    assert!(records[0].matched_keyword);
}

#[tokio::test]
async fn test_pagination_stops_at_boundary_page() {
    let t = now();
    let since = t - Duration::days(3);
    let at = |hours: i64| t - Duration::hours(hours);

    let stub = Arc::new(
        StubSlack::new()
            .with_page(None, page(vec![slack_msg(at(1), "U1", "ai_acq one")], Some("p2")))
            .with_page(
                Some("p2"),
                page(
                    vec![
                        slack_msg(at(20), "U1", "ai_acq two"),
                        slack_msg(at(30), "U2", "nothing here"),
                    ],
                    Some("p3"),
                ),
            )
            .with_page(
                Some("p3"),
                page(
                    vec![
                        slack_msg(at(50), "U2", "AI_ACQ three"),
                        slack_msg(at(80), "U1", "ai_acq too old"),
                    ],
                    Some("p4"),
                ),
            )
            .with_page(Some("p4"), page(vec![slack_msg(at(100), "U1", "ai_acq older still")], None))
            .with_user("U1", "Hannah Park")
            .with_user("U2", "Omar Diaz"),
    );

    let records = fetcher(&stub).fetch_messages(CHANNEL, since, t, "ai_acq").await.unwrap();

    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["ai_acq one", "ai_acq two", "AI_ACQ three"]);
    assert_eq!(
        stub.cursors_requested(),
        vec![None, Some("p2".to_string()), Some("p3".to_string())]
    );
}

#[tokio::test]
async fn test_every_record_is_in_window_and_mentions_keyword() {
    let t = now();
    let since = t - Duration::hours(48);
    let until = t - Duration::hours(6);

    let texts = ["ai_acq ping", "AI_ACQ caps", "no mention", "see Ai_Acq?", "almost ai-acq"];
    let messages = (0..60)
        .map(|i| slack_msg(t - Duration::hours(i), if i % 2 == 0 { "U1" } else { "U2" }, texts[i as usize % texts.len()]))
        .collect();

    let stub = Arc::new(
        StubSlack::new()
            .with_page(None, page(messages, None))
            .with_user("U1", "Hannah Park")
            .with_user("U2", "Omar Diaz"),
    );

    let records = fetcher(&stub).fetch_messages(CHANNEL, since, until, "ai_acq").await.unwrap();

    assert!(!records.is_empty());
    for record in &records {
        assert!(record.timestamp >= since && record.timestamp <= until, "{} outside window", record.ts);
        assert!(record.text.to_lowercase().contains("ai_acq"), "{:?} lacks keyword", record.text);
    }
    assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn test_fetch_is_idempotent() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(
                None,
                page(
                    vec![
                        slack_msg(t - Duration::minutes(5), "U1", "ai_acq a"),
                        slack_msg(t - Duration::minutes(50), "U2", "ai_acq b"),
                    ],
                    None,
                ),
            )
            .with_user("U1", "Hannah Park")
            .with_user("U2", "Omar Diaz"),
    );
    let fetcher = fetcher(&stub);

    let first = fetcher.fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq").await.unwrap();
    let second = fetcher.fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_author_lookup_cached_per_call() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(
                None,
                page(
                    vec![
                        slack_msg(t - Duration::minutes(1), "U1", "ai_acq first"),
                        slack_msg(t - Duration::minutes(2), "U1", "ai_acq second"),
                        slack_msg(t - Duration::minutes(3), "U1", "ai_acq third"),
                    ],
                    None,
                ),
            )
            .with_user("U1", "Hannah Park"),
    );

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.author == "Hannah Park"));
    assert_eq!(*stub.user_lookups.lock(), vec!["U1".to_string()]);
}

#[tokio::test]
async fn test_unknown_author_falls_back_to_id() {
    let t = now();
    let stub = Arc::new(StubSlack::new().with_page(
        None,
        page(vec![slack_msg(t - Duration::minutes(1), "U404", "ai_acq hi")], None),
    ));

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records[0].author, "U404");
}

#[tokio::test]
async fn test_malformed_and_userless_messages_skipped() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(
                None,
                page(
                    vec![
                        json!({ "type": "message", "text": "ai_acq without ts" }),
                        json!({ "type": "message", "ts": "not-a-ts", "user": "U1", "text": "ai_acq" }),
                        json!({ "type": "message", "subtype": "bot_message", "ts": format!("{}.000000", (t - Duration::minutes(2)).timestamp()), "text": "ai_acq from a bot" }),
                        slack_msg(t - Duration::minutes(3), "U1", "ai_acq valid"),
                    ],
                    None,
                ),
            )
            .with_user("U1", "Hannah Park"),
    );

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "ai_acq valid");
}

#[tokio::test]
async fn test_request_carries_window_and_page_size() {
    let t = now();
    let stub = Arc::new(StubSlack::new().with_page(None, page(vec![], None)));

    fetcher(&stub)
        .with_page_size(500)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    let requests = stub.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].channel, CHANNEL);
    assert_eq!(requests[0].limit, 200);
    assert_eq!(requests[0].oldest.as_deref(), Some("1725976800.000000"));
    assert_eq!(requests[0].latest.as_deref(), Some("1725980400.000000"));
}

#[tokio::test]
async fn test_scan_limit_stops_paging() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(
                None,
                page(
                    vec![
                        slack_msg(t - Duration::minutes(1), "U1", "ai_acq 1"),
                        slack_msg(t - Duration::minutes(2), "U1", "ai_acq 2"),
                    ],
                    Some("p2"),
                ),
            )
            .with_user("U1", "Hannah Park"),
    );

    let records = fetcher(&stub)
        .with_scan_limit(2)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(stub.history_calls(), 1);
}

#[tokio::test]
async fn test_rate_limit_retried_then_succeeds() {
    let t = now();
    let stub = Arc::new(
        StubSlack::new()
            .with_page(None, page(vec![slack_msg(t - Duration::minutes(1), "U1", "ai_acq hi")], None))
            .with_user("U1", "Hannah Park")
            .failing_with(vec![
                SlackError::RateLimited { retry_after: None },
                SlackError::RateLimited { retry_after: None },
            ]),
    );

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(stub.history_calls(), 3);
}

#[tokio::test]
async fn test_persistent_rate_limit_is_unavailable() {
    let t = now();
    let stub = Arc::new(StubSlack::new());
    stub.fail_always(|| SlackError::RateLimited { retry_after: None });

    let err = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Unavailable { attempts: 4, .. }), "{:?}", err);
    assert!(!err.is_fatal());
    assert_eq!(stub.history_calls(), 4);
}

#[tokio::test]
async fn test_invalid_auth_is_fatal_without_retry() {
    let t = now();
    let stub = Arc::new(StubSlack::new().failing_with(vec![SlackError::from_code("invalid_auth")]));

    let err = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Auth(ref code) if code == "invalid_auth"));
    assert!(err.is_fatal());
    assert_eq!(stub.history_calls(), 1);
}

#[tokio::test]
async fn test_inverted_window_rejected() {
    let t = now();
    let stub = Arc::new(StubSlack::new());

    let err = fetcher(&stub)
        .fetch_messages(CHANNEL, t, t - Duration::hours(1), "ai_acq")
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InvalidWindow { .. }));
    assert_eq!(stub.history_calls(), 0);
}

#[tokio::test]
async fn test_empty_window_is_not_an_error() {
    let t = now();
    let stub = Arc::new(StubSlack::new().with_page(
        None,
        page(vec![slack_msg(t - Duration::days(3), "U1", "ai_acq old")], None),
    ));

    let records = fetcher(&stub)
        .fetch_messages(CHANNEL, t - Duration::hours(1), t, "ai_acq")
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_thread_stats() {
    let t = now();
    let parent_at = t - Duration::hours(2);
    let parent_ts = format!("{}.000000", parent_at.timestamp());

    let mut accepted = slack_msg(parent_at + Duration::minutes(30), "U2", "try restarting it");
    accepted["reactions"] = json!([{ "name": "white_check_mark", "count": 1 }]);

    let stub = Arc::new(
        StubSlack::new()
            .with_page(None, page(vec![slack_msg(parent_at, "U1", "ai_acq help")], None))
            .with_replies(
                &parent_ts,
                vec![
                    slack_msg(parent_at, "U1", "ai_acq help"),
                    accepted,
                    slack_msg(parent_at + Duration::minutes(45), "U1", "thanks"),
                ],
            )
            .with_user("U1", "Hannah Park")
            .with_user("U2", "Omar Diaz"),
    );
    let fetcher = fetcher(&stub);

    let records = fetcher
        .fetch_messages(CHANNEL, t - Duration::hours(3), t, "ai_acq")
        .await
        .unwrap();
    let stats = fetcher.thread_stats(CHANNEL, &records).await;

    assert_eq!(stats.total_threads, 1);
    assert_eq!(stats.threads_with_replies, 1);
    assert_eq!(stats.threads_with_resolution, 1);
    assert_eq!(stats.response_times, vec![30.0]);
    assert_eq!(stats.active_responders(), 2);
    assert_eq!(stats.top_performers, vec![("Omar Diaz".to_string(), 1)]);
}

#[tokio::test]
async fn test_userless_accepted_reply_resolves_thread() {
    let t = now();
    let parent_at = t - Duration::hours(2);
    let parent_ts = format!("{}.000000", parent_at.timestamp());

    let workflow_reply = json!({
        "type": "message",
        "subtype": "bot_message",
        "ts": format!("{}.000000", (parent_at + Duration::minutes(5)).timestamp()),
        "bot_id": "B01",
        "text": "ticket closed",
        "reactions": [{ "name": "white_check_mark", "count": 1 }],
    });

    let stub = Arc::new(
        StubSlack::new()
            .with_page(None, page(vec![slack_msg(parent_at, "U1", "ai_acq help")], None))
            .with_replies(&parent_ts, vec![slack_msg(parent_at, "U1", "ai_acq help"), workflow_reply])
            .with_user("U1", "Hannah Park"),
    );
    let fetcher = fetcher(&stub);

    let records = fetcher
        .fetch_messages(CHANNEL, t - Duration::hours(3), t, "ai_acq")
        .await
        .unwrap();
    let stats = fetcher.thread_stats(CHANNEL, &records).await;

    assert_eq!(stats.threads_with_replies, 1);
    assert_eq!(stats.threads_with_resolution, 1);
    assert_eq!(stats.resolution_rate(), 100.0);
    assert_eq!(stats.active_responders(), 0);
    assert!(stats.top_performers.is_empty());
}
