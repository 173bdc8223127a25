//! Integration tests for events

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, InstallError};
    use kiln_events::*;

    #[tokio::test]
    async fn test_emit_helpers() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, AppEvent::General(GeneralEvent::Error { .. })));
        assert_eq!(event1.log_level(), tracing::Level::ERROR);

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(
            event2,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_missing_sender_is_silent() {
        let none: Option<EventSender> = None;
        none.emit_warning("nobody listening");
    }

    #[test]
    fn test_failure_context_from_error() {
        let err: Error = InstallError::Conflict {
            path: "lib/shared.txt".into(),
            first: "a-1.0.0".into(),
            second: "b-1.0.0".into(),
        }
        .into();
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), Some("install.conflict"));
        assert!(!failure.retryable);
        assert!(failure.hint.is_some());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Install(InstallEvent::FetchStarted {
            package: "boltons".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "install");
        assert_eq!(json["event"]["type"], "FetchStarted");
        assert_eq!(event.event_source(), EventSource::INSTALL);
    }
}
