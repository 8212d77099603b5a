use presencerelay::{Catalog, ErrorCategory, Opcode, ProtocolContext, RelayError};

#[test]
fn error_category_matches_constructor() {
    let error = RelayError::SocketClosed;
    assert!(error.is_connection_error());
    assert_eq!(error.category(), ErrorCategory::Connection);
    assert!(error.is_recoverable());

    let timeout = RelayError::HandshakeTimeout(5000);
    assert_eq!(timeout.category(), ErrorCategory::Protocol);
    assert!(timeout.is_recoverable());

    let exhausted = RelayError::NoFreeSlot { attempted: 10 };
    assert!(exhausted.is_connection_error());
    assert!(!exhausted.is_recoverable());
}

#[test]
fn protocol_violation_context_is_preserved() {
    let context = ProtocolContext::with_opcodes(Opcode::Handshake.into(), Opcode::Frame.into());
    let error = RelayError::protocol_violation("frame before handshake", context.clone());

    match error {
        RelayError::ProtocolViolation {
            context: received, ..
        } => {
            assert_eq!(received.expected_opcode, Some(0));
            assert_eq!(received.received_opcode, Some(1));
            assert_eq!(received, context);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn malformed_catalog_is_a_configuration_error() {
    let error = Catalog::from_json("{ not an array").unwrap_err();
    assert!(matches!(error, RelayError::InvalidCatalog(_)));
    assert_eq!(error.category(), ErrorCategory::Configuration);
}

#[test]
fn io_errors_convert_with_question_mark() {
    fn read_missing() -> presencerelay::Result<Catalog> {
        Catalog::from_path("/definitely/not/here/detectable.json")
    }

    let error = read_missing().unwrap_err();
    assert!(matches!(error, RelayError::Io(_)));
    assert!(error.is_connection_error());
}
