//! Transaction engine behaviour against a scripted modem.
//!
//! Every test runs on a manual clock: the session's polling sleeps advance
//! time, so deadlines are exact and nothing waits in real time.

use esp_at_metrics::export::InMemoryRecorder;
use esp_at_metrics::metrics;
use esp_at_protocol::mock::{ManualClock, ScriptedTransport};
use esp_at_protocol::{
    AtError, AtSession, Clock, SessionConfig, SntpTime, TransactionRequest, TransportError,
};

const POLL_MS: u64 = 1;
const QUIESCENCE_MS: u64 = 10;

fn new_session() -> AtSession<ScriptedTransport, ManualClock> {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new(clock.clone());
    AtSession::new(transport, clock)
}

// ============================================================================
// execute
// ============================================================================

#[test]
fn test_fire_and_forget_writes_one_frame_per_call() {
    let mut session = new_session();

    for command in ["AT", "AT+CIPSTATUS", "AT+CWJAP=\"a b\",\"c\""] {
        assert!(session.execute(command, None, 100));
    }

    let writes = session.transport().writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].data, b"AT\r\n");
    assert_eq!(writes[1].data, b"AT+CIPSTATUS\r\n");
    assert_eq!(writes[2].data, b"AT+CWJAP=\"a b\",\"c\"\r\n");
}

#[test]
fn test_ok_within_window_succeeds() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_after("AT+CWMODE=1", 40, b"AT+CWMODE=1\r\n\r\nOK\r\n");

    assert!(session.execute("AT+CWMODE=1", Some("OK"), 100));
}

#[test]
fn test_error_fails_before_deadline() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_after("AT+CWJAP=\"x\",\"y\"", 50, b"+CWJAP:1\r\n\r\nERROR\r\nOK\r\n");

    assert!(!session.execute("AT+CWJAP=\"x\",\"y\"", Some("OK"), 20_000));

    let sent_at = session.transport().writes()[0].at_ms;
    let elapsed = session.clock().now_ms() - sent_at;
    assert!(elapsed >= 50, "returned before ERROR arrived: {} ms", elapsed);
    assert!(elapsed <= 50 + POLL_MS, "waited past ERROR: {} ms", elapsed);
}

#[test]
fn test_error_only_disqualifies_waits_for_ok() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_after("AT+RESTORE", 5, b"ERROR\r\n");
    session
        .transport_mut()
        .inject_at(QUIESCENCE_MS + 300, b"ready\r\n");

    assert!(session.execute("AT+RESTORE", Some("ready"), 5_000));
}

#[test]
fn test_execute_timeout_bounds() {
    for timeout in [0, 1, 100, 777] {
        let mut session = new_session();
        assert!(!session.execute("AT", Some("OK"), timeout));

        let sent_at = session.transport().writes()[0].at_ms;
        let elapsed = session.clock().now_ms() - sent_at;
        assert!(elapsed >= timeout, "timeout {}: returned after {} ms", timeout, elapsed);
        assert!(
            elapsed <= timeout + POLL_MS,
            "timeout {}: returned after {} ms",
            timeout,
            elapsed
        );
    }
}

#[test]
fn test_execute_discards_stale_lines() {
    let mut session = new_session();
    session.transport_mut().inject(b"OK\r\nleftover");

    session.transport_mut().reply_after("AT+CIPSTATUS", 20, b"STATUS:2\r\n");
    assert!(session.execute("AT+CIPSTATUS", Some("STATUS:"), 100));
    assert_eq!(session.buffered_len(), 0);
}

#[test]
fn test_execute_recovers_unterminated_ok_at_deadline() {
    let mut session = new_session();
    session.transport_mut().reply_to("AT", b"O");
    session.transport_mut().inject_at(QUIESCENCE_MS + 30, b"K");

    assert!(session.execute("AT", Some("OK"), 100));

    let sent_at = session.transport().writes()[0].at_ms;
    let elapsed = session.clock().now_ms() - sent_at;
    assert!(elapsed > 100, "matched before the deadline: {} ms", elapsed);
    assert!(elapsed <= 100 + POLL_MS);
    assert_eq!(session.buffered_len(), 0);
}

#[test]
fn test_closed_transport_ends_wait_immediately() {
    let mut session = new_session();
    session.transport_mut().fail_reads();

    assert!(!session.execute("AT+CWJAP=\"home\",\"secret\"", Some("OK"), 20_000));

    let sent_at = session.transport().writes()[0].at_ms;
    assert!(session.clock().now_ms() - sent_at <= POLL_MS);
    // One read while flushing and one in the wait.
    assert_eq!(session.transport().read_attempts(), 2);

    let result = session.transact(&TransactionRequest::new("AT").expect("OK").with_timeout(500));
    assert!(matches!(result, Err(AtError::Transport(TransportError::Closed))));
}

#[test]
fn test_closed_transport_ends_query() {
    let mut session = new_session();
    session.transport_mut().fail_reads();

    assert_eq!(session.query("STATUS:", 1_000), "");
    assert_eq!(session.clock().now_ms(), 0);
    assert_eq!(session.transport().read_attempts(), 1);
}

#[test]
fn test_custom_config_is_honoured() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new(clock.clone());
    let config = SessionConfig {
        quiescence_ms: 0,
        poll_interval_ms: 5,
        ..SessionConfig::default()
    };
    let mut session = AtSession::with_config(transport, clock, config);

    assert!(!session.execute("AT", Some("OK"), 12));
    assert_eq!(session.transport().writes()[0].at_ms, 0);
    assert_eq!(session.clock().now_ms(), 15);
}

// ============================================================================
// query
// ============================================================================

#[test]
fn test_status_then_ok() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_to("AT+CIPSTATUS", b"STATUS:5\r\nOK\r\n");

    assert!(session.send("AT+CIPSTATUS"));
    assert_eq!(session.query("STATUS:", 1000), "STATUS:5");
    assert_eq!(session.query("OK", 200), "OK");
}

#[test]
fn test_queries_partition_stream() {
    let mut session = new_session();
    session.transport_mut().reply_to(
        "AT+CWLAP",
        b"+CWLAP:(3,\"a\")\r\n+CWLAP:(4,\"b\")\r\n+CWLAP:(3,\"c\")\r\n\r\nOK\r\n",
    );

    session.send("AT+CWLAP");
    assert_eq!(session.query("+CWLAP:", 200), "+CWLAP:(3,\"a\")");
    assert_eq!(session.query("+CWLAP:", 200), "+CWLAP:(4,\"b\")");
    assert_eq!(session.query("+CWLAP:", 200), "+CWLAP:(3,\"c\")");
    assert_eq!(session.query("+CWLAP:", 50), "");
    assert_eq!(session.buffered_len(), 0);
}

#[test]
fn test_query_does_not_return_consumed_line() {
    let mut session = new_session();
    session.transport_mut().reply_to("AT+X", b"OK\r\n");

    session.send("AT+X");
    assert_eq!(session.query("OK", 100), "OK");
    assert_eq!(session.query("OK", 100), "");
}

#[test]
fn test_query_does_not_send_or_flush() {
    let mut session = new_session();
    session.transport_mut().inject(b"STATUS:2\r\n");

    assert_eq!(session.query("STATUS:", 100), "STATUS:2");
    assert!(session.transport().writes().is_empty());
}

#[test]
fn test_query_collects_line_split_across_reads() {
    let mut session = new_session();
    session.transport_mut().inject_at(3, b"+CIPSNTP");
    session.transport_mut().inject_at(7, b"TIME:Mon Dec 12 02:33:32 2016\r");
    session.transport_mut().inject_at(9, b"\nOK\r\n");

    let line = session.query("+CIPSNTPTIME:", 2000);
    assert_eq!(line, "+CIPSNTPTIME:Mon Dec 12 02:33:32 2016");
    assert_eq!(session.clock().now_ms(), 9);
    assert_eq!(session.query("OK", 200), "OK");
}

#[test]
fn test_query_ignores_error_lines() {
    let mut session = new_session();
    session.transport_mut().inject(b"ERROR\r\n");
    session.transport_mut().inject_at(30, b"OK\r\n");

    assert_eq!(session.query("OK", 200), "OK");
}

#[test]
fn test_query_timeout_bounds() {
    let mut session = new_session();
    let start = session.clock().now_ms();

    assert_eq!(session.query("STATUS:", 1000), "");
    let elapsed = session.clock().now_ms() - start;
    assert!((1000..=1000 + POLL_MS).contains(&elapsed));
}

#[test]
fn test_unterminated_time_is_recovered_at_deadline() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_after("AT+CIPSNTPTIME?", 15, b"+CIPSNTPTIME:Mon Jan 1 00:00:00 1970");

    session.send("AT+CIPSNTPTIME?");
    let start = session.clock().now_ms();
    let line = session.query("+CIPSNTPTIME:", 500);

    assert_eq!(line, "+CIPSNTPTIME:Mon Jan 1 00:00:00 1970");
    assert!(session.clock().now_ms() - start > 500);
    assert_eq!(session.buffered_len(), 0);

    let time = SntpTime::parse(&line).unwrap();
    assert!(!time.is_synchronized());
}

#[test]
fn test_unterminated_other_text_is_not_recovered() {
    let mut session = new_session();
    session.transport_mut().inject(b"busy p...");

    assert_eq!(session.query("OK", 50), "");
}

// ============================================================================
// initialize
// ============================================================================

#[test]
fn test_initialize_requires_ready_and_ok() {
    let mut session = new_session();
    session
        .transport_mut()
        .reply_after("AT+RESTORE", 1200, b"\r\n\r\nready\r\n");
    session.transport_mut().reply_to("ATE0", b"ATE0\r\nOK\r\n");

    assert!(!session.is_initialized());
    assert!(session.initialize());
    assert!(session.is_initialized());
    assert_eq!(session.transport().written_lines(), vec!["AT+RESTORE", "ATE0"]);
}

#[test]
fn test_initialize_fails_without_ready() {
    let mut session = new_session();
    session.transport_mut().reply_to("ATE0", b"OK\r\n");

    assert!(!session.initialize());
    assert!(!session.is_initialized());
    // Gave up after the restore wait, never sent ATE0.
    assert_eq!(session.transport().written_lines(), vec!["AT+RESTORE"]);
    assert!(session.clock().now_ms() > 5_000);
}

#[test]
fn test_initialize_fails_when_echo_off_rejected() {
    let mut session = new_session();
    session.transport_mut().reply_to("AT+RESTORE", b"ready\r\n");
    session.transport_mut().reply_to("ATE0", b"ERROR\r\n");

    assert!(!session.initialize());
    assert!(!session.is_initialized());
}

#[test]
fn test_reinitialize_clears_flag_on_failure() {
    let mut session = new_session();
    session.transport_mut().reply_to("AT+RESTORE", b"ready\r\n");
    session.transport_mut().reply_to("ATE0", b"OK\r\n");
    assert!(session.initialize());

    assert!(!session.initialize());
    assert!(!session.is_initialized());
}

// ============================================================================
// metrics
// ============================================================================

#[test]
fn test_transactions_are_recorded() {
    let recorder = InMemoryRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let mut session = new_session();
        session
            .transport_mut()
            .reply_to("AT+CWMODE=9", b"AT+CWMODE=9\r\nbusy p...\r\nERROR\r\n");
        session.transport_mut().reply_to("AT", b"OK\r\n");

        assert!(!session.execute("AT+CWMODE=9", Some("OK"), 100));
        assert!(session.execute("AT", Some("OK"), 100));
        assert!(session.send("ATE0"));
    });

    let disqualified = [("kind", "execute"), ("outcome", "disqualified")];
    assert_eq!(recorder.counter("esp_at.transactions", &disqualified), 1);
    assert_eq!(recorder.counter("esp_at.transactions", &[("outcome", "matched")]), 1);
    assert_eq!(recorder.counter("esp_at.transactions", &[("outcome", "sent")]), 1);
    assert_eq!(recorder.counter("esp_at.transactions", &[("device", "esp32")]), 3);
    assert_eq!(recorder.counter("esp_at.lines_discarded", &[]), 2);
    assert_eq!(
        recorder.counter("esp_at.bytes_written", &[]),
        ("AT+CWMODE=9\r\n".len() + "AT\r\n".len() + "ATE0\r\n".len()) as u64
    );
    assert_eq!(
        recorder.histogram("esp_at.transaction_duration_ms", &[("kind", "execute")]).len(),
        2
    );
}

#[test]
fn test_device_label_is_applied() {
    let recorder = InMemoryRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone());
        let mut session = AtSession::new(transport, clock).with_device_label("bench");
        session.query("OK", 5);
    });

    let timeout = [("device", "bench"), ("kind", "query"), ("outcome", "timeout")];
    assert_eq!(recorder.counter("esp_at.transactions", &timeout), 1);
    assert_eq!(recorder.counter("esp_at.transactions", &[("device", "esp32")]), 0);
}
