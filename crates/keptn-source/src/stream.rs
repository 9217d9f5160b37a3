//! Background poll loop and the stream handle returned to the host.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{EventsApi, EventsRequest};
use crate::config::Config;
use crate::errors::SourceError;
use crate::message::SourceEvent;

/// Default delay between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Tuning for one stream session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    /// Delay between poll cycles; also the width of each poll window.
    pub poll_interval: Duration,
    /// Capacity of the hand-off channel to the host.
    ///
    /// Once the channel is full the loop waits until the host reads, so a
    /// consumer that stops reading also stops polling.
    pub buffer_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer_capacity: 1,
        }
    }
}

impl StreamOptions {
    /// Overrides the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the hand-off channel capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SourceError> {
        if self.poll_interval.is_zero() {
            return Err(SourceError::Validation(
                "poll_interval must be greater than 0".into(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(SourceError::Validation(
                "buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Handle used to stop a running stream session.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The loop stops before starting its next cycle; an API call already in
    /// flight is allowed to finish first.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns whether cancellation was requested.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of a stream session.
pub struct EventStream {
    session_id: uuid::Uuid,
    rx: mpsc::Receiver<SourceEvent>,
    abort_handle: AbortHandle,
    task: JoinHandle<()>,
}

impl EventStream {
    /// Returns the id used to tag this session's log lines.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a handle that can cancel the session.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next outgoing event.
    ///
    /// Returns `None` once the poll loop has stopped and the channel is drained.
    pub async fn next_event(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }

    /// Cancels the session and waits for the poll task to exit.
    pub async fn finish(self) {
        self.abort_handle.abort();
        drop(self.rx);
        if let Err(err) = self.task.await {
            warn!(
                event = "keptn.stream_task_failed",
                session_id = %self.session_id,
                error = %err,
                "poll task ended abnormally"
            );
        }
    }
}

/// Starts the poll loop for `config` on the current tokio runtime.
pub fn spawn_poll_loop(
    api: Arc<dyn EventsApi>,
    config: Config,
    options: StreamOptions,
) -> Result<EventStream, SourceError> {
    options.validate()?;

    let session_id = uuid::Uuid::new_v4();
    let (tx, rx) = mpsc::channel(options.buffer_capacity);
    let (abort_tx, abort_rx) = watch::channel(false);
    let task = tokio::spawn(poll_task(
        session_id,
        api,
        config,
        options.poll_interval,
        tx,
        abort_rx,
    ));

    Ok(EventStream {
        session_id,
        rx,
        abort_handle: AbortHandle {
            tx: Arc::new(abort_tx),
        },
        task,
    })
}

async fn poll_task(
    session_id: uuid::Uuid,
    api: Arc<dyn EventsApi>,
    config: Config,
    interval: Duration,
    tx: mpsc::Sender<SourceEvent>,
    mut abort_rx: watch::Receiver<bool>,
) {
    info!(
        event = "keptn.stream_started",
        session_id = %session_id,
        project = %config.project,
        service = %config.service,
        interval_ms = interval.as_millis() as u64,
        "Keptn poll loop started"
    );

    let mut cycle = 0_u64;
    loop {
        if *abort_rx.borrow() || tx.is_closed() {
            break;
        }
        cycle = cycle.saturating_add(1);

        let window = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
        let request = EventsRequest {
            project: config.project.clone(),
            service: config.service.clone(),
            from_time: chrono::Utc::now() - window,
        };

        match api.events(&request).await {
            Ok(events) => {
                debug!(
                    event = "keptn.poll_succeeded",
                    session_id = %session_id,
                    cycle,
                    count = events.len() as u64
                );
                if !emit_events(events, &tx, &mut abort_rx).await {
                    break;
                }
            }
            Err(err) => {
                warn!(
                    event = "keptn.poll_failed",
                    session_id = %session_id,
                    cycle,
                    code = err.code(),
                    error = %err,
                    "failed to get events"
                );
            }
        }

        if !wait_or_abort(interval, &tx, &mut abort_rx).await {
            break;
        }
    }

    info!(
        event = "keptn.stream_stopped",
        session_id = %session_id,
        cycles = cycle,
        "Keptn poll loop stopped"
    );
}

/// Sends every event in order. Returns `false` when the loop must stop.
///
/// Cancellation wins over a ready send, so events fetched by a call that was
/// in flight when `abort` fired are dropped.
async fn emit_events(
    events: Vec<crate::event::Event>,
    tx: &mpsc::Sender<SourceEvent>,
    abort_rx: &mut watch::Receiver<bool>,
) -> bool {
    for event in events {
        let out = SourceEvent::from_event(event);
        tokio::select! {
            biased;
            _ = aborted(abort_rx) => return false,
            sent = tx.send(out) => {
                if sent.is_err() {
                    debug!(event = "keptn.receiver_dropped", "stream receiver dropped");
                    return false;
                }
            }
        }
    }
    true
}

/// Sleeps for `interval`. Returns `false` if cancellation fired or the
/// receiver went away meanwhile.
async fn wait_or_abort(
    interval: Duration,
    tx: &mpsc::Sender<SourceEvent>,
    abort_rx: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        biased;
        _ = aborted(abort_rx) => false,
        _ = tx.closed() => {
            debug!(event = "keptn.receiver_dropped", "stream receiver dropped");
            false
        }
        _ = tokio::time::sleep(interval) => true,
    }
}

async fn aborted(abort_rx: &mut watch::Receiver<bool>) {
    let sender_gone = abort_rx.wait_for(|aborted| *aborted).await.is_err();
    // A dropped sender can never abort; park forever in that case.
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApiError;
    use crate::event::{Event, EventData};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedApi {
        script: Mutex<VecDeque<Result<Vec<Event>, ApiError>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<EventsRequest>>,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<Vec<Event>, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl EventsApi for ScriptedApi {
        async fn events(&self, request: &EventsRequest) -> Result<Vec<Event>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.into(),
            event_type: "sh.keptn.event.deployment.finished".into(),
            data: EventData {
                status: Some("succeeded".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn fast() -> StreamOptions {
        StreamOptions::default().poll_interval(Duration::from_millis(20))
    }

    fn config() -> Config {
        Config {
            project: "sockshop".into(),
            service: "carts".into(),
            ..Config::default()
        }
    }

    #[test]
    fn rejects_zero_interval_and_capacity() {
        assert!(matches!(
            StreamOptions::default()
                .poll_interval(Duration::ZERO)
                .validate(),
            Err(SourceError::Validation(_))
        ));
        assert!(matches!(
            StreamOptions::default().buffer_capacity(0).validate(),
            Err(SourceError::Validation(_))
        ));
        assert_eq!(StreamOptions::default().poll_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn emits_formatted_events_in_order() {
        let api = ScriptedApi::new(vec![Ok(vec![event("a"), event("b")])]);
        let mut stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();

        let first = stream.next_event().await.unwrap();
        let second = stream.next_event().await.unwrap();
        assert_eq!(first.raw_object.id, "a");
        assert_eq!(second.raw_object.id, "b");
        assert_eq!(
            first.message.sections[0].header,
            ":large_green_circle: sh.keptn.event.deployment.finished"
        );
        stream.finish().await;

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests[0].project, "sockshop");
        assert_eq!(requests[0].service, "carts");
    }

    #[tokio::test]
    async fn poll_window_trails_now_by_interval() {
        let api = ScriptedApi::new(vec![Ok(vec![event("a")])]);
        let before = chrono::Utc::now();
        let mut stream = spawn_poll_loop(
            api.clone(),
            config(),
            StreamOptions::default().poll_interval(Duration::from_secs(60)),
        )
        .unwrap();
        stream.next_event().await.unwrap();
        let after = chrono::Utc::now();
        stream.finish().await;

        let from_time = api.requests.lock().unwrap()[0].from_time;
        assert!(from_time >= before - chrono::Duration::seconds(60));
        assert!(from_time <= after - chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn request_error_does_not_stop_next_cycle() {
        let api = ScriptedApi::new(vec![
            Err(ApiError::Network("connection refused".into())),
            Ok(vec![event("after-error")]),
        ]);
        let mut stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), stream.next_event())
            .await
            .expect("event after failed cycle")
            .unwrap();
        assert_eq!(received.raw_object.id, "after-error");
        assert!(api.calls.load(Ordering::SeqCst) >= 2);
        stream.finish().await;
    }

    #[tokio::test]
    async fn immediate_abort_emits_nothing_and_stops_promptly() {
        let api = ScriptedApi::new(vec![Ok(vec![event("never")])]);
        let options = fast();
        let mut stream = spawn_poll_loop(api.clone(), config(), options.clone()).unwrap();
        stream.abort_handle().abort();
        assert!(stream.abort_handle().is_aborted());

        let next = tokio::time::timeout(options.poll_interval, stream.next_event())
            .await
            .expect("loop should stop within one interval");
        assert!(next.is_none());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        stream.finish().await;
    }

    #[tokio::test]
    async fn abort_interrupts_long_sleep() {
        let api = ScriptedApi::new(vec![]);
        let stream = spawn_poll_loop(
            api.clone(),
            config(),
            StreamOptions::default().poll_interval(Duration::from_secs(3600)),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(2), stream.finish())
            .await
            .expect("finish should not wait for the full interval");
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_channel_blocks_polling_until_drained() {
        let api = ScriptedApi::new(vec![
            Ok(vec![event("a"), event("b"), event("c")]),
            Ok(vec![event("d")]),
        ]);
        let mut stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        let ids: Vec<String> = [
            stream.next_event().await,
            stream.next_event().await,
            stream.next_event().await,
            stream.next_event().await,
        ]
        .into_iter()
        .map(|e| e.unwrap().raw_object.id)
        .collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        stream.finish().await;
    }

    struct BlockingApi {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        calls: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EventsApi for BlockingApi {
        async fn events(&self, _request: &EventsRequest) -> Result<Vec<Event>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![event("fetched-before-abort")])
        }
    }

    #[tokio::test]
    async fn abort_during_call_lets_call_finish_and_drops_its_events() {
        let api = Arc::new(BlockingApi {
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        });
        let mut stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();

        api.entered.notified().await;
        stream.abort_handle().abort();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(api.completed.load(Ordering::SeqCst), 0);

        api.release.notify_one();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next_event())
            .await
            .expect("loop should stop once the call returns");
        assert!(next.is_none());
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.completed.load(Ordering::SeqCst), 1);
        tokio::time::timeout(Duration::from_secs(2), stream.finish())
            .await
            .expect("task should exit");
    }

    #[tokio::test]
    async fn dropping_stream_stops_polling_without_events() {
        let api = ScriptedApi::new(vec![]);
        let stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(api.calls.load(Ordering::SeqCst) >= 1);

        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let calls_after_drop = api.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), calls_after_drop);
    }

    #[tokio::test]
    async fn dropped_receiver_stops_loop() {
        let api = ScriptedApi::new(vec![Ok(vec![event("a"), event("b")])]);
        let stream = spawn_poll_loop(api.clone(), config(), fast()).unwrap();
        let EventStream { rx, task, .. } = stream;
        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("task should exit once the receiver is gone")
            .unwrap();
    }
}
