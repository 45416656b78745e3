use espmon::core::telemetry::fake::{ScriptedChunk, ScriptedSource};
use espmon::core::telemetry::{
    classify, FrameDecoder, Message, Notification, SessionEnd, StreamReader, TelemetrySample,
};
use std::time::Duration;
use tokio::sync::mpsc;

const TRACE: &str = concat!(
    "I (312) boot: ESP-IDF v5.1 2nd stage bootloader\n",
    "{\"heap_total\": 327680, \"heap_free\": 180224, \"internal_total\": 262144, \"internal_free\": 98304}\n",
    "\n",
    "{\"error\": \"Failed to get task stats\", \"code\": 261}\n",
    "{\"tasks\": [{\"task_name\": \"IDLE0\", \"run_time\": 900, \"percentage\": 90.0, \"core\": 0}, ",
    "{\"task_name\": \"wifi\", \"run_time\": 50, \"percentage\": 5.0, \"core\": 0, \"status\": \"created\"}]}\n",
    "{\"tag\": \"timer_isr\", \"duration\": 12}\n",
    "{\"heap_total\": 327680, \"heap_free\": 170000, \"internal_total\": 262144, \"internal_free\": 90000}\n",
);

fn decode_all(chunks: &[&[u8]]) -> Vec<Message> {
    let mut decoder = FrameDecoder::new();
    chunks
        .iter()
        .flat_map(|chunk| decoder.feed(chunk).collect::<Vec<_>>())
        .filter_map(|line| classify(&line))
        .collect()
}

#[test]
fn test_output_independent_of_chunk_boundaries() {
    let bytes = TRACE.as_bytes();
    let whole = decode_all(&[bytes]);
    assert_eq!(whole.len(), 4);

    for split in [1, 7, 64, 200, bytes.len() - 1] {
        let (a, b) = bytes.split_at(split);
        assert_eq!(decode_all(&[a, b]), whole, "split at {}", split);
    }

    let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(decode_all(&single_bytes), whole);
}

#[test]
fn test_reader_delivers_in_stream_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let chunks: Vec<ScriptedChunk> = TRACE
        .as_bytes()
        .chunks(13)
        .map(|chunk| ScriptedChunk::bytes(chunk.to_vec()))
        .chain(std::iter::once(ScriptedChunk::failure("unplugged")))
        .collect();
    let source = ScriptedSource::with_script(chunks).idle_timeout(Duration::from_millis(5));

    let reader = StreamReader::start(source, tx).unwrap();
    assert_eq!(reader.join().unwrap(), SessionEnd::TransportFailed);

    let mut received = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        received.push(notification);
    }

    assert_eq!(received.len(), 5);
    assert!(matches!(
        received[0],
        Notification::Data(TelemetrySample::Memory(ref m)) if m.heap_free == 180_224
    ));
    assert_eq!(
        received[1],
        Notification::ProtocolError("Failed to get task stats (code: 261)".to_string())
    );
    assert!(matches!(
        received[2],
        Notification::Data(TelemetrySample::Tasks(ref s)) if s.tasks.len() == 2
    ));
    assert!(matches!(
        received[3],
        Notification::Data(TelemetrySample::Memory(ref m)) if m.heap_free == 170_000
    ));
    assert!(matches!(received[4], Notification::TransportError(ref e) if e.contains("unplugged")));
}

#[test]
fn test_stop_ends_idle_session() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let source = ScriptedSource::with_script(Vec::new()).idle_timeout(Duration::from_millis(10));
    let closed = source.closed_flag();

    let reader = StreamReader::start(source, tx).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert!(reader.is_active());

    assert_eq!(reader.shutdown().unwrap(), SessionEnd::Stopped);
    assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(rx.try_recv().is_err());
}
