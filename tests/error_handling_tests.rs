use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use aircom::core::protocol::{codec, PortCommand, CMD_SET_PARITY, HOST_OFFSET};
use aircom::core::transport::mock::{MockDeviceHandle, MockTransportFactory};
use aircom::{Device, Session, SessionEvent, SessionStatus};

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event queue closed")
}

async fn assert_no_more_events(events: &mut UnboundedReceiver<SessionEvent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err(), "unexpected extra event");
}

fn session_with_factory() -> (Session, Arc<MockTransportFactory>) {
    let factory = Arc::new(MockTransportFactory::new());
    let device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
    let session = Session::with_factory(device, 1, factory.clone()).unwrap();
    (session, factory)
}

async fn connect(
    session: &Session,
    events: &mut UnboundedReceiver<SessionEvent>,
) {
    assert!(session.connect());
    assert_eq!(next_event(events).await, SessionEvent::WillConnect);
    assert_eq!(next_event(events).await, SessionEvent::DidConnect);
}

/// Error handling tests for the session state machine
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure_notifies_and_stays_disconnected() {
        let (session, factory) = session_with_factory();
        factory.expect_failed_connection("no route to host");
        let mut events = session.take_events().unwrap();

        assert!(session.connect());
        assert_eq!(next_event(&mut events).await, SessionEvent::WillConnect);
        match next_event(&mut events).await {
            SessionEvent::FailedToConnect { message } => {
                assert!(message.contains("no route to host"));
            }
            other => panic!("expected FailedToConnect, got {:?}", other),
        }
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert_no_more_events(&mut events).await;
    }

    #[tokio::test]
    async fn test_transport_loss_fires_one_disconnect() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        handle.close();
        assert_eq!(next_event(&mut events).await, SessionEvent::DidDisconnect);
        assert_eq!(session.status(), SessionStatus::Disconnected);

        // Buffer contents survive a transport loss until flush/connect
        assert_no_more_events(&mut events).await;
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (session, factory) = session_with_factory();
        let _handle = factory.expect_connection();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        session.disconnect();
        session.disconnect();

        assert_eq!(next_event(&mut events).await, SessionEvent::DidDisconnect);
        assert_no_more_events(&mut events).await;
        assert_eq!(session.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_abandoned_connect_never_reports_success() {
        let (session, factory) = session_with_factory();
        let _handle = factory.expect_slow_connection(Duration::from_millis(200));
        let mut events = session.take_events().unwrap();

        assert!(session.connect());
        assert_eq!(next_event(&mut events).await, SessionEvent::WillConnect);

        // Abandon while the transport is still opening
        session.disconnect();
        assert_eq!(session.status(), SessionStatus::Disconnected);

        // The late open completion must not surface as DidConnect
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(session.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_overflow_signals_once_per_episode() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        session.set_buffer_capacity(4);
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        handle.inject_data(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::BytesAvailable { count: 4 }
        );
        assert_eq!(next_event(&mut events).await, SessionEvent::DidOverflow);

        // Still overflowing: no further overflow event, no data appended
        handle.inject_data(&[7, 8]);
        assert_no_more_events(&mut events).await;

        // Contents are the bytes that fit, in order, no duplication
        let mut buf = [0u8; 8];
        let n = session.read(&mut buf);
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_authentication_accept() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        session.set_credentials("admin", b"secret").unwrap();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        // The engine enters Authenticating right after sending the request
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.status(), SessionStatus::Authenticating);

        handle.inject_command(&PortCommand::AuthResult(true));
        assert_eq!(next_event(&mut events).await, SessionEvent::DidAuthenticate);
        assert!(session.authenticated());
    }

    #[tokio::test]
    async fn test_authentication_reject_keeps_session_connected() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        session.set_credentials("admin", b"wrong").unwrap();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        handle.inject_command(&PortCommand::AuthResult(false));
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::DidFailToAuthenticate
        );

        // Rejection is not a transport failure
        assert!(!session.authenticated());
        assert!(session.connected());
        assert_eq!(session.status(), SessionStatus::Connected);

        // Data still flows
        handle.inject_data(b"ok");
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::BytesAvailable { count: 2 }
        );
    }

    #[tokio::test]
    async fn test_keepalive_timeout_disconnects() {
        let (session, factory) = session_with_factory();
        let _handle = factory.expect_connection();
        session.set_keepalive(aircom::KeepaliveConfig {
            enabled: true,
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(100),
        });
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        // Device never answers the probe: the engine declares the link dead
        assert_eq!(next_event(&mut events).await, SessionEvent::DidDisconnect);
        assert_eq!(session.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_keepalive_survives_while_traffic_flows() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        session.set_keepalive(aircom::KeepaliveConfig {
            enabled: true,
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(150),
        });
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        // Keep answering with some traffic for a while
        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            handle.inject_command(&PortCommand::KeepaliveResponse);
        }

        assert!(session.connected());
        session.disconnect();
    }

    #[tokio::test]
    async fn test_malformed_command_does_not_corrupt_stream() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        // Data, a malformed parity confirm, more data, in one delivery
        let mut wire = codec::encode_data(b"abc");
        wire.extend(codec::encode_suboption(CMD_SET_PARITY + HOST_OFFSET, &[99]));
        wire.extend(codec::encode_data(b"def"));
        handle.inject(&wire);

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::BytesAvailable { count: 6 }
        );
        let mut buf = [0u8; 16];
        let n = session.read(&mut buf);
        assert_eq!(&buf[..n], b"abcdef");

        // The malformed frame changed nothing and was not fatal
        assert!(session.connected());
        assert_eq!(session.parity(), aircom::Parity::None);
    }

    #[tokio::test]
    async fn test_unknown_command_is_skipped() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        // A vendor command from a newer firmware revision
        handle.inject(&codec::encode_suboption(90, &[1, 2, 3]));
        handle.inject_data(b"still alive");

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::BytesAvailable { count: 11 }
        );
        assert!(session.connected());
    }

    #[tokio::test]
    async fn test_flush_discards_buffered_data() {
        let (session, factory) = session_with_factory();
        let handle = factory.expect_connection();
        let mut events = session.take_events().unwrap();
        connect(&session, &mut events).await;

        handle.inject_data(b"stale");
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::BytesAvailable { count: 5 }
        );

        session.flush();
        assert_eq!(session.bytes_available(), 0);
        let mut buf = [0u8; 8];
        assert_eq!(session.read(&mut buf), 0);
    }
}
