//! TCP transport against a loopback listener playing the module.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use esp_at_client::EspClient;
use esp_at_protocol::{AtSession, Transport, TransportError};
use esp_at_runner::cli::{self, Command};
use esp_at_runner::config::RunnerConfig;
use esp_at_runner::tcp::{SystemClock, TcpTransport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Command lines and the module output each one triggers.
type Script = Vec<(&'static str, &'static str)>;

/// Accept one connection and answer each received line from `script`.
///
/// Returns the lines received once the client disconnects.
fn spawn_module(script: Script) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local address");

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let mut writer = stream.try_clone().expect("clone stream");
        let reader = BufReader::new(stream);

        let mut received = Vec::new();
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let line = line.trim_end_matches('\r').to_string();
            if let Some((_, reply)) = script.iter().find(|(command, _)| *command == line) {
                writer.write_all(reply.as_bytes()).expect("reply");
            }
            received.push(line);
        }
        received
    });

    (addr, handle)
}

fn connect(addr: SocketAddr) -> TcpTransport {
    TcpTransport::connect(&addr.to_string(), CONNECT_TIMEOUT).expect("connect")
}

#[test]
fn test_status_over_tcp() {
    let (addr, module) = spawn_module(vec![("AT+CIPSTATUS", "STATUS:2\r\n\r\nOK\r\n")]);

    let mut session = AtSession::new(connect(addr), SystemClock::new());
    assert!(session.send("AT+CIPSTATUS"));
    assert_eq!(session.query("STATUS:", 1000), "STATUS:2");
    assert_eq!(session.query("OK", 200), "OK");

    drop(session);
    assert_eq!(module.join().unwrap(), vec!["AT+CIPSTATUS"]);
}

#[test]
fn test_error_reply_over_tcp() {
    let (addr, module) = spawn_module(vec![("AT+CWMODE=9", "ERROR\r\n")]);

    let mut session = AtSession::new(connect(addr), SystemClock::new());
    let started = Instant::now();
    assert!(!session.execute("AT+CWMODE=9", Some("OK"), 2_000));
    assert!(started.elapsed() < Duration::from_millis(1_500));

    drop(session);
    module.join().unwrap();
}

#[test]
fn test_cli_commands_over_tcp() {
    let (addr, module) = spawn_module(vec![
        ("AT+GMR", "AT version:2.2.0.0\r\n\r\nOK\r\n"),
        ("AT+CIPSTATUS", "STATUS:5\r\n\r\nOK\r\n"),
    ]);

    let config = RunnerConfig::default();
    let mut client = EspClient::new(AtSession::new(connect(addr), SystemClock::new()));

    let raw = Command::Raw {
        command: "AT+GMR".to_string(),
        expect: Some("OK".to_string()),
        timeout: 1_000,
    };
    assert!(cli::execute(&mut client, &raw, &config).is_ok());
    assert!(cli::execute(&mut client, &Command::Status, &config).is_ok());

    let connect_without_ssid = Command::Connect {
        ssid: None,
        password: None,
    };
    assert!(cli::execute(&mut client, &connect_without_ssid, &config).is_err());

    drop(client);
    assert_eq!(module.join().unwrap(), vec!["AT+GMR", "AT+CIPSTATUS"]);
}

#[test]
fn test_peer_close_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let module = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"ready\r\n").unwrap();
    });

    let mut transport = connect(addr);
    module.join().unwrap();

    let mut received = Vec::new();
    let closed = loop {
        match transport.read_available() {
            Ok(data) => received.extend_from_slice(&data),
            Err(e) => break e,
        }
        thread::sleep(Duration::from_millis(1));
    };

    assert_eq!(received, b"ready\r\n");
    assert!(matches!(closed, TransportError::Closed));
    assert!(transport.is_closed());
    assert!(transport.write(b"AT\r\n").is_err());
}

#[test]
fn test_stalled_write_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // The peer accepts and then never reads.
    let module = thread::spawn(move || listener.accept().unwrap().0);

    let mut transport = connect(addr).with_write_stall_timeout(Duration::from_millis(50));
    let peer = module.join().unwrap();

    let started = Instant::now();
    let result = transport.write(&vec![b'A'; 64 * 1024 * 1024]);

    assert!(
        matches!(result, Err(TransportError::Io(ref e)) if e.kind() == std::io::ErrorKind::TimedOut)
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!transport.is_closed());
    drop(peer);
}
