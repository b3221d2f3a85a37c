use super::*;

fn entry(stream: LogStream, message: &str) -> LogEntry {
    LogEntry {
        stream,
        message: message.to_owned(),
        source_process: "api-worker".to_owned(),
        timestamp: format!("ts-{message}"),
    }
}

fn messages<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> Vec<&'a str> {
    entries.map(|e| e.message.as_str()).collect()
}

#[test]
fn new_buffer_is_empty() {
    let buffer = LogBuffer::new(3);
    assert!(buffer.is_empty());
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.capacity(), 3);
}

#[test]
fn push_preserves_arrival_order() {
    let mut buffer = LogBuffer::new(10);
    for message in ["a", "b", "c"] {
        assert!(buffer.push(entry(LogStream::Out, message)).is_none());
    }
    assert_eq!(messages(buffer.view(LogFilter::Both)), vec!["a", "b", "c"]);
}

#[test]
fn push_at_capacity_evicts_oldest_first() {
    let mut buffer = LogBuffer::new(2);
    buffer.push(entry(LogStream::Out, "a"));
    buffer.push(entry(LogStream::Out, "b"));

    let evicted = buffer.push(entry(LogStream::Out, "c")).expect("oldest evicted");
    assert_eq!(evicted.message, "a");
    assert_eq!(buffer.len(), 2);
    assert_eq!(messages(buffer.view(LogFilter::Both)), vec!["b", "c"]);
}

#[test]
fn length_never_exceeds_capacity() {
    let mut buffer = LogBuffer::new(5);
    for i in 0..50 {
        let stream = if i % 3 == 0 { LogStream::Error } else { LogStream::Out };
        buffer.push(entry(stream, &i.to_string()));
        assert!(buffer.len() <= 5, "len {} after push {i}", buffer.len());
    }
    assert_eq!(messages(buffer.view(LogFilter::Both)), vec!["45", "46", "47", "48", "49"]);
}

#[test]
fn zero_capacity_buffer_stores_nothing() {
    let mut buffer = LogBuffer::new(0);
    let rejected = buffer.push(entry(LogStream::Out, "a")).expect("returned");
    assert_eq!(rejected.message, "a");
    assert!(buffer.is_empty());
}

#[test]
fn filtered_view_does_not_mutate_buffer() {
    let mut buffer = LogBuffer::new(10);
    buffer.push(entry(LogStream::Out, "ready"));
    buffer.push(entry(LogStream::Error, "boom"));
    buffer.push(entry(LogStream::Out, "done"));

    assert_eq!(messages(buffer.view(LogFilter::Error)), vec!["boom"]);
    assert_eq!(messages(buffer.view(LogFilter::Out)), vec!["ready", "done"]);
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.snapshot(LogFilter::Both).len(), 3);
}

#[test]
fn clear_empties_buffer_and_keeps_capacity() {
    let mut buffer = LogBuffer::new(4);
    buffer.push(entry(LogStream::Out, "a"));
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), 4);
}

#[test]
fn entry_from_log_frame_maps_fields() {
    let frame = LogFrame {
        process: "api-worker".to_owned(),
        log_type: LogStream::Error,
        message: "boom".to_owned(),
        timestamp: "t1".to_owned(),
    };
    let entry = LogEntry::from(frame);
    assert_eq!(entry.stream, LogStream::Error);
    assert_eq!(entry.source_process, "api-worker");
    assert_eq!(entry.message, "boom");
    assert_eq!(entry.timestamp, "t1");
}

#[test]
fn entry_serializes_with_lowercase_stream() {
    let json = serde_json::to_value(entry(LogStream::Error, "x")).expect("serialize");
    assert_eq!(json["stream"], "error");
    assert_eq!(json["source_process"], "api-worker");
}
