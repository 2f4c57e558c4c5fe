mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use wakeflow_core::engine::scripted::LiveEngines;
use wakeflow_core::{
    CoordinatorBuilder, CoordinatorManager, ErrorKind, Inference, KeywordRef, ManagerStatus,
    PipelineEvent, PipelineEventKind, VoiceProcessor, WavBackend, WakeflowError,
};

use common::*;

fn recv_event_with_timeout(
    rx: &mut broadcast::Receiver<PipelineEvent>,
    timeout: Duration,
) -> PipelineEvent {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(ev) => return ev,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for pipeline event");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("event channel closed unexpectedly"),
        }
    }
}

struct Setup {
    _dir: tempfile::TempDir,
    live: LiveEngines,
    manager: CoordinatorManager,
    wakes: Arc<AtomicUsize>,
    inferences: Arc<Mutex<Vec<Inference>>>,
}

fn setup(paced: bool) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let wav = write_fixture(dir.path());
    let (keyword, context) = write_resources(dir.path());
    let live = LiveEngines::new();
    let wakes = Arc::new(AtomicUsize::new(0));
    let inferences = Arc::new(Mutex::new(Vec::new()));

    let (w, i) = (Arc::clone(&wakes), Arc::clone(&inferences));
    let builder = CoordinatorBuilder::new("test-access-key", KeywordRef::Path(keyword), context)
        .on_wake_word(move |_| {
            w.fetch_add(1, Ordering::SeqCst);
        })
        .on_inference(move |inference| i.lock().push(inference));

    let processor = VoiceProcessor::shared(WavBackend::new(wav).paced(paced));
    let manager = CoordinatorManager::new(
        processor,
        builder,
        spotter_factory(&live),
        recognizer_factory(&live),
    )
    .unwrap();

    Setup {
        _dir: dir,
        live,
        manager,
        wakes,
        inferences,
    }
}

#[test]
fn wav_stream_produces_wake_word_and_inference_events() {
    let s = setup(false);
    let mut rx = s.manager.subscribe();

    s.manager.start().unwrap();
    let timeout = Duration::from_secs(5);

    // Unpaced playback can outrun the status update, so only the relative
    // order of wake word and inference is fixed.
    let mut events = Vec::new();
    while !matches!(
        events.last().map(|e: &PipelineEvent| &e.kind),
        Some(PipelineEventKind::Inference { .. })
    ) {
        events.push(recv_event_with_timeout(&mut rx, timeout));
    }

    assert!(events.iter().any(|e| e.kind
        == PipelineEventKind::Status {
            status: ManagerStatus::Listening
        }));
    let kinds: Vec<_> = events
        .iter()
        .filter(|e| !matches!(e.kind, PipelineEventKind::Status { .. }))
        .map(|e| e.kind.clone())
        .collect();
    assert_eq!(
        kinds,
        vec![
            PipelineEventKind::WakeWord { keyword_index: 0 },
            PipelineEventKind::Inference {
                inference: coffee()
            },
        ]
    );
    assert!(events.windows(2).all(|w| w[1].seq > w[0].seq));

    s.manager.stop().unwrap();
    assert_eq!(s.wakes.load(Ordering::SeqCst), 1);
    assert_eq!(*s.inferences.lock(), vec![coffee()]);
    assert_eq!(s.manager.status(), ManagerStatus::Stopped);
}

#[test]
fn restart_replays_from_the_beginning() {
    let s = setup(false);

    s.manager.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while s.inferences.lock().is_empty() {
        assert!(Instant::now() < deadline, "first pass never finished");
        thread::sleep(Duration::from_millis(5));
    }
    s.manager.stop().unwrap();

    s.manager.start().unwrap();
    while s.inferences.lock().len() < 2 {
        assert!(Instant::now() < deadline, "second pass never finished");
        thread::sleep(Duration::from_millis(5));
    }
    s.manager.stop().unwrap();

    assert_eq!(s.wakes.load(Ordering::SeqCst), 2);
    assert_eq!(*s.inferences.lock(), vec![coffee(), coffee()]);
}

#[test]
fn delete_mid_stream_releases_engines() {
    // Paced playback of the fixture lasts ~2.8 s; delete long before the end.
    let s = setup(true);
    assert_eq!(s.live.count(), 2);

    s.manager.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    s.manager.delete().unwrap();

    assert_eq!(s.live.count(), 0);
    assert!(!s.manager.is_running());
    assert!(!s.manager.processor().is_recording());
    assert_eq!(s.manager.status(), ManagerStatus::Deleted);
    assert_eq!(s.manager.start().unwrap_err().kind(), ErrorKind::InvalidState);
    assert!(s.inferences.lock().is_empty());
}

#[test]
fn unreadable_source_fails_start_and_detaches() {
    let dir = tempfile::tempdir().unwrap();
    let (keyword, context) = write_resources(dir.path());
    let live = LiveEngines::new();
    let builder = CoordinatorBuilder::new("test-access-key", KeywordRef::Path(keyword), context)
        .on_wake_word(|_| {})
        .on_inference(|_| {});
    let processor = VoiceProcessor::shared(WavBackend::new(dir.path().join("missing.wav")));
    let errors = Arc::new(Mutex::new(Vec::<WakeflowError>::new()));
    let sink = Arc::clone(&errors);
    let manager = CoordinatorManager::new(
        Arc::clone(&processor),
        builder,
        spotter_factory(&live),
        recognizer_factory(&live),
    )
    .unwrap()
    .with_process_error_callback(move |e| sink.lock().push(e.clone()));

    let err = manager.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!manager.is_running());
    assert_eq!(processor.num_frame_listeners(), 0);
    assert_eq!(processor.num_error_listeners(), 0);
    assert!(errors.lock().is_empty(), "start failures are returned, not routed");
}
