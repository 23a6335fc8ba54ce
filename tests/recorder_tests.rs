// Integration tests for the segmenting recorder
//
// These tests drive a remote-controlled host recorder and a loopback
// transcription stub, verifying segment accumulation: the chunk-count
// flush, the final flush on stop, and fatal recorder errors.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{spawn_stub_transcriber, webm_chunk, FakeRecorderFactory};
use meetscribe::{
    MediaRecorderEvent, MediaStream, MediaTrack, ProducerEvent, SegmentingRecorder,
    SegmentingRecorderConfig, TrackKind, TranscriptionBackend, TranscriptionClient,
    TranscriptionConfig,
};
use tokio::sync::mpsc;

fn audio_stream() -> MediaStream {
    MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "system-audio")])
}

fn test_recorder_config() -> SegmentingRecorderConfig {
    SegmentingRecorderConfig {
        flush_interval: Duration::from_millis(200),
        max_chunks_per_segment: 3,
        min_auto_flush_bytes: 100,
        ..Default::default()
    }
}

fn test_client(cloud_url: String) -> Arc<TranscriptionClient> {
    let config = TranscriptionConfig {
        cloud_url,
        min_segment_bytes: 10,
        min_request_interval: Duration::ZERO,
        ..TranscriptionConfig::for_backend(TranscriptionBackend::Cloud)
    };
    Arc::new(TranscriptionClient::new(config).expect("client should build"))
}

async fn next_event(rx: &mut mpsc::Receiver<ProducerEvent>) -> ProducerEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for producer event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_mime_selection_falls_back_through_preferences() {
    let (url, _) = spawn_stub_transcriber("").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));
    let (tx, _rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        test_client(url),
        test_recorder_config(),
        tx,
    );

    assert_eq!(
        recorder.select_mime_type(),
        "audio/webm",
        "first supported entry of the preference list wins"
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert_eq!(factory.created_mime().as_deref(), Some("audio/webm"));
    recorder.stop().await;
}

#[tokio::test]
async fn test_chunk_count_threshold_flushes_a_segment() {
    let (url, hits) = spawn_stub_transcriber("texto del sistema").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));
    let (tx, mut rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        test_client(url),
        test_recorder_config(),
        tx,
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert!(matches!(
        next_event(&mut rx).await,
        ProducerEvent::Started(meetscribe::TranscriptSource::System)
    ));

    let chunks = factory.recorder_events();
    for _ in 0..3 {
        chunks.send(webm_chunk(1000)).await.expect("chunk delivered");
    }

    match next_event(&mut rx).await {
        ProducerEvent::Final { source, text, confidence } => {
            assert_eq!(source, meetscribe::TranscriptSource::System);
            assert_eq!(text, "texto del sistema");
            assert_eq!(confidence, None, "system text carries no confidence");
        }
        other => panic!("expected final event, got {:?}", other),
    }
    assert_eq!(
        hits.load(std::sync::atomic::Ordering::SeqCst),
        1,
        "three chunks are one segment, one request"
    );

    recorder.stop().await;
}

#[tokio::test]
async fn test_stop_flushes_the_remainder() {
    let (url, hits) = spawn_stub_transcriber("cola final").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));
    let (tx, mut rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        test_client(url),
        test_recorder_config(),
        tx,
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert!(matches!(next_event(&mut rx).await, ProducerEvent::Started(_)));

    // Two chunks: below the count threshold, so nothing flushes yet.
    let chunks = factory.recorder_events();
    chunks.send(webm_chunk(500)).await.expect("chunk delivered");
    chunks.send(webm_chunk(500)).await.expect("chunk delivered");
    drop(chunks);

    recorder.stop().await;

    let mut saw_final = false;
    let mut saw_stopped = false;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
    {
        match event {
            ProducerEvent::Final { text, .. } => {
                assert_eq!(text, "cola final");
                saw_final = true;
            }
            ProducerEvent::Stopped(_) => {
                saw_stopped = true;
                break;
            }
            _ => {}
        }
    }
    assert!(saw_final, "stop must flush buffered audio");
    assert!(saw_stopped, "stop must end the producer");
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_with_nothing_buffered_sends_no_request() {
    let (url, hits) = spawn_stub_transcriber("nunca").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));
    let (tx, mut rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        test_client(url),
        test_recorder_config(),
        tx,
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert!(matches!(next_event(&mut rx).await, ProducerEvent::Started(_)));
    recorder.stop().await;

    assert!(matches!(
        next_event(&mut rx).await,
        ProducerEvent::Stopped(meetscribe::TranscriptSource::System)
    ));
    assert_eq!(
        hits.load(std::sync::atomic::Ordering::SeqCst),
        0,
        "an empty buffer must not produce a request"
    );
    assert!(!recorder.is_recording());
}

#[tokio::test]
async fn test_recorder_error_is_fatal_for_the_producer() {
    let (url, _) = spawn_stub_transcriber("").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));
    let (tx, mut rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        test_client(url),
        test_recorder_config(),
        tx,
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert!(matches!(next_event(&mut rx).await, ProducerEvent::Started(_)));

    factory
        .recorder_events()
        .send(MediaRecorderEvent::Error("encoder died".to_string()))
        .await
        .expect("error delivered");

    match next_event(&mut rx).await {
        ProducerEvent::Error { fatal, message, .. } => {
            assert!(fatal, "recorder errors are not self-recovered");
            assert!(message.contains("encoder died"));
        }
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(matches!(
        next_event(&mut rx).await,
        ProducerEvent::Stopped(meetscribe::TranscriptSource::System)
    ));
}

#[tokio::test]
async fn test_undersized_segments_are_dropped_silently() {
    let (url, hits) = spawn_stub_transcriber("nunca").await;
    let factory = Arc::new(FakeRecorderFactory::new(vec!["audio/webm"]));

    // Raise the floor so everything this test records is undersized.
    let config = TranscriptionConfig {
        cloud_url: url,
        min_segment_bytes: 1_000_000,
        min_request_interval: Duration::ZERO,
        ..TranscriptionConfig::for_backend(TranscriptionBackend::Cloud)
    };
    let client = Arc::new(TranscriptionClient::new(config).expect("client should build"));

    let (tx, mut rx) = mpsc::channel(64);
    let recorder = SegmentingRecorder::new(
        Arc::clone(&factory) as Arc<dyn meetscribe::MediaRecorderFactory>,
        client,
        test_recorder_config(),
        tx,
    );

    recorder.start(&audio_stream()).await.expect("should start");
    assert!(matches!(next_event(&mut rx).await, ProducerEvent::Started(_)));

    let chunks = factory.recorder_events();
    for _ in 0..3 {
        chunks.send(webm_chunk(100)).await.expect("chunk delivered");
    }
    drop(chunks);
    recorder.stop().await;

    // Only Stopped arrives: no final, no error, no request.
    loop {
        match next_event(&mut rx).await {
            ProducerEvent::Stopped(_) => break,
            ProducerEvent::Final { .. } | ProducerEvent::Error { .. } => {
                panic!("undersized segments must be dropped without effect")
            }
            _ => {}
        }
    }
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);
}
