use super::*;

fn log_json(message: &Value) -> String {
    serde_json::json!({
        "type": "log",
        "process": "api-worker",
        "logType": "out",
        "message": message,
        "timestamp": "t1"
    })
    .to_string()
}

#[test]
fn ping_encodes_to_bare_discriminant() {
    assert_eq!(encode_frame(&Outbound::Ping), r#"{"type":"ping"}"#);
}

#[test]
fn decode_log_frame_reads_all_fields() {
    let frame = decode_frame(&log_json(&serde_json::json!("ready"))).expect("decode");
    assert_eq!(
        frame,
        Inbound::Log(LogFrame {
            process: "api-worker".to_owned(),
            log_type: LogStream::Out,
            message: "ready".to_owned(),
            timestamp: "t1".to_owned(),
        })
    );
    assert_eq!(frame.kind(), "log");
}

#[test]
fn decode_connected_frame() {
    let text = r#"{"type":"connected","message":"attached","process":"api-worker","logType":"both"}"#;
    let frame = decode_frame(text).expect("decode");
    let Inbound::Connected(connected) = frame else {
        panic!("expected connected frame, got {frame:?}");
    };
    assert_eq!(connected.message, "attached");
    assert_eq!(connected.process, "api-worker");
    assert_eq!(connected.log_type, "both");
}

#[test]
fn decode_error_frame_carries_message() {
    let frame = decode_frame(r#"{"type":"error","message":"process not found"}"#).expect("decode");
    assert_eq!(
        frame,
        Inbound::Error(ErrorFrame {
            message: "process not found".to_owned()
        })
    );
}

#[test]
fn decode_pong_ignores_extra_fields() {
    assert_eq!(decode_frame(r#"{"type":"pong"}"#).expect("decode"), Inbound::Pong);
    assert_eq!(decode_frame(r#"{"type":"pong","ts":5}"#).expect("decode"), Inbound::Pong);
}

#[test]
fn decode_rejects_invalid_json() {
    let err = decode_frame("{not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn decode_rejects_non_object_payloads() {
    assert!(matches!(decode_frame("[1,2]"), Err(CodecError::NotAnObject)));
    assert!(matches!(decode_frame("\"log\""), Err(CodecError::NotAnObject)));
}

#[test]
fn decode_rejects_missing_or_non_string_discriminant() {
    assert!(matches!(decode_frame(r#"{"message":"x"}"#), Err(CodecError::MissingType)));
    assert!(matches!(decode_frame(r#"{"type":7}"#), Err(CodecError::MissingType)));
}

#[test]
fn decode_rejects_unknown_discriminant() {
    let err = decode_frame(r#"{"type":"ping"}"#).expect_err("ping is outbound only");
    assert!(matches!(err, CodecError::UnknownType(ref kind) if kind == "ping"));
}

#[test]
fn decode_rejects_log_frame_with_unknown_stream() {
    let text = r#"{"type":"log","process":"p","logType":"both","message":"m","timestamp":"t"}"#;
    let err = decode_frame(text).expect_err("stream must be out or error");
    assert!(matches!(err, CodecError::Malformed { ref kind, .. } if kind == "log"));
}

#[test]
fn log_message_object_is_coerced_to_json_text() {
    let frame = decode_frame(&log_json(&serde_json::json!({"level": "info"}))).expect("decode");
    let Inbound::Log(log) = frame else {
        panic!("expected log frame");
    };
    assert_eq!(log.message, r#"{"level":"info"}"#);
}

#[test]
fn log_message_scalars_are_coerced_to_text() {
    let Inbound::Log(number) = decode_frame(&log_json(&serde_json::json!(42))).expect("decode") else {
        panic!("expected log frame");
    };
    assert_eq!(number.message, "42");

    let Inbound::Log(null) = decode_frame(&log_json(&Value::Null)).expect("decode") else {
        panic!("expected log frame");
    };
    assert_eq!(null.message, "");
}

#[test]
fn log_frame_defaults_missing_optional_fields() {
    let frame = decode_frame(r#"{"type":"log","logType":"error"}"#).expect("decode");
    assert_eq!(
        frame,
        Inbound::Log(LogFrame {
            process: String::new(),
            log_type: LogStream::Error,
            message: String::new(),
            timestamp: String::new(),
        })
    );
}

#[test]
fn serialized_inbound_frames_decode_back() {
    let frame = Inbound::Error(ErrorFrame {
        message: "boom".to_owned(),
    });
    let text = serde_json::to_string(&frame).expect("serialize");
    assert_eq!(text, r#"{"type":"error","message":"boom"}"#);
    assert_eq!(decode_frame(&text).expect("decode"), frame);
}

#[test]
fn log_stream_serializes_as_lowercase_json() {
    assert_eq!(serde_json::to_string(&LogStream::Out).expect("serialize"), "\"out\"");
    assert_eq!(LogStream::Error.to_string(), "error");
}

#[test]
fn log_stream_rejects_non_lowercase_json() {
    assert!(serde_json::from_str::<LogStream>("\"Error\"").is_err());
}
