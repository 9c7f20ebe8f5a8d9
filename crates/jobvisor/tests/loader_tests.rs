#![cfg(unix)]

use jobvisor::{
    Ack, ConversationParams, JobCallbacks, JobError, JobParams, Loader, OutputCollector,
    SupervisorConfig, ToolPaths, new_loader,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug)]
enum Event {
    Begin,
    Data(String),
    Error(JobError),
    End(bool),
}

/// Records every callback and acknowledges immediately
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    ended: Notify,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    async fn wait_for_end(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.ended.notified())
            .await
            .expect("job did not reach end");
    }
}

impl JobCallbacks for Recorder {
    fn begin(&self) {
        self.push(Event::Begin);
    }

    fn data(&self, data: String, ack: Ack) {
        self.push(Event::Data(data));
        ack.done();
    }

    fn error(&self, error: JobError) {
        self.push(Event::Error(error));
    }

    fn end(&self, success: bool, ack: Ack) {
        self.push(Event::End(success));
        self.ended.notify_one();
        ack.done();
    }
}

struct Fixture {
    dir: TempDir,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl Fixture {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_file(true)
            .with_thread_ids(false)
            .with_target(false)
            .with_line_number(true)
            .try_init();

        Self {
            dir: tempfile::tempdir().unwrap(),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Write a shell script to be passed to a tool configured as `sh`
    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn loader(&self, tools: ToolPaths, suppress_errors: bool) -> Loader {
        let config = SupervisorConfig::builder()
            .suppress_errors(suppress_errors)
            .tools(tools)
            .build()
            .unwrap();
        new_loader(&self.root, self.tracker.clone(), &config).unwrap()
    }

    fn summary_via_sh(&self, suppress_errors: bool) -> Loader {
        self.loader(
            ToolPaths {
                capinfos: "sh".into(),
                ..Default::default()
            },
            suppress_errors,
        )
    }

    async fn settle(&self) {
        self.tracker.close();
        tokio::time::timeout(Duration::from_secs(10), self.tracker.wait())
            .await
            .expect("supervisor tasks did not finish");
    }
}

fn errors(events: &[Event]) -> Vec<&JobError> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Error(err) => Some(err),
            _ => None,
        })
        .collect()
}

fn lifecycle(events: &[Event]) -> Vec<&Event> {
    events
        .iter()
        .filter(|e| !matches!(e, Event::Error(_)))
        .collect()
}

#[tokio::test]
async fn test_summary_job_collects_output() {
    let fixture = Fixture::new();
    let target = fixture.script(
        "summary.sh",
        "echo 'Number of packets:   42'\necho 'File size:           1024 bytes'\n",
    );
    let loader = fixture.summary_via_sh(false);

    let (collector, done) = OutputCollector::channel();
    loader.start(&target, JobParams::Summary, Arc::new(collector)).unwrap();
    assert!(loader.is_busy());

    let output = tokio::time::timeout(Duration::from_secs(10), done)
        .await
        .unwrap()
        .unwrap();
    fixture.settle().await;

    assert!(output.success);
    assert!(output.errors.is_empty());
    assert_eq!(
        output.data.as_deref(),
        Some("Number of packets:   42\nFile size:           1024 bytes\n")
    );
    assert!(!loader.is_busy());
}

#[tokio::test]
async fn test_failing_command_reports_partial_output_and_error() {
    let fixture = Fixture::new();
    let target = fixture.script("broken.sh", "echo 'half a report'\nexit 4\n");
    let loader = fixture.summary_via_sh(false);

    let recorder = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, recorder.clone()).unwrap();
    recorder.wait_for_end().await;
    fixture.settle().await;

    let events = recorder.take();
    assert!(matches!(
        lifecycle(&events).as_slice(),
        [Event::Begin, Event::Data(text), Event::End(true)] if text == "half a report\n"
    ));

    let errors = errors(&events);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_bad_command());
    assert_eq!(
        errors[0].command(),
        Some(format!("sh {}", target.display()).as_str())
    );
    assert!(errors[0].to_string().contains("exit status 4"));
}

#[tokio::test]
async fn test_conversation_arguments_reach_the_tool() {
    let fixture = Fixture::new();
    let loader = fixture.loader(
        ToolPaths {
            tshark: "echo".into(),
            ..Default::default()
        },
        false,
    );
    let params = JobParams::Conversations(
        ConversationParams::builder()
            .categories(["eth", "tcp"])
            .filter("tcp.port == 80")
            .absolute_time(true)
            .build()
            .unwrap(),
    );

    let (collector, done) = OutputCollector::channel();
    loader.start("trace.pcap", params, Arc::new(collector)).unwrap();
    let output = done.await.unwrap();
    fixture.settle().await;

    assert_eq!(
        output.data.as_deref(),
        Some("-q -r trace.pcap -t a -n -z conv,eth,tcp.port == 80 -z conv,tcp,tcp.port == 80\n")
    );
}

#[tokio::test]
async fn test_missing_tool_fails_to_start() {
    let fixture = Fixture::new();
    let loader = fixture.loader(
        ToolPaths {
            capinfos: fixture.dir.path().join("no-such-capinfos"),
            ..Default::default()
        },
        false,
    );

    let recorder = Arc::new(Recorder::default());
    loader
        .start("trace.pcap", JobParams::Summary, recorder.clone())
        .unwrap();
    recorder.wait_for_end().await;
    fixture.settle().await;

    match recorder.take().as_slice() {
        [Event::Begin, Event::Error(e), Event::End(false)] => assert!(e.is_terminal()),
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_stop_kills_running_job() {
    let fixture = Fixture::new();
    let target = fixture.script("slow.sh", "echo started\nsleep 30\necho finished\n");
    let loader = fixture.summary_via_sh(false);

    let recorder = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, recorder.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    loader.stop();

    recorder.wait_for_end().await;
    fixture.settle().await;

    let events = recorder.take();
    assert!(matches!(
        lifecycle(&events).as_slice(),
        [Event::Begin, Event::Data(text), Event::End(true)] if text == "started\n"
    ));
    let errors = errors(&events);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("terminated by signal 9"));
}

#[tokio::test]
async fn test_shutdown_suppresses_kill_errors() {
    let fixture = Fixture::new();
    let target = fixture.script("slow.sh", "sleep 30\n");
    let loader = fixture.summary_via_sh(false);

    let recorder = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, recorder.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    loader.shutdown();

    recorder.wait_for_end().await;
    fixture.settle().await;

    assert!(loader.suppress_errors());
    assert!(errors(&recorder.take()).is_empty());
    assert!(matches!(
        loader.start(&target, JobParams::Summary, recorder.clone()),
        Err(JobError::Shutdown)
    ));
}

#[tokio::test]
async fn test_busy_until_previous_job_released() {
    let fixture = Fixture::new();
    let target = fixture.script("slow.sh", "sleep 30\n");
    let loader = fixture.summary_via_sh(true);

    let first = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, first.clone()).unwrap();
    assert!(matches!(
        loader.start(&target, JobParams::Summary, Arc::new(Recorder::default())),
        Err(JobError::Busy)
    ));

    loader.stop();
    first.wait_for_end().await;
    while loader.is_busy() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let quick = fixture.script("quick.sh", "echo again\n");
    let (collector, done) = OutputCollector::channel();
    loader.start(&quick, JobParams::Summary, Arc::new(collector)).unwrap();
    assert_eq!(done.await.unwrap().data.as_deref(), Some("again\n"));
    fixture.settle().await;
}

#[tokio::test]
async fn test_dropping_loader_kills_job() {
    let fixture = Fixture::new();
    let target = fixture.script("slow.sh", "sleep 30\n");
    let loader = fixture.summary_via_sh(false);

    let recorder = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, recorder.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(loader);

    recorder.wait_for_end().await;
    fixture.settle().await;
    assert!(errors(&recorder.take()).is_empty());
}

#[tokio::test]
async fn test_root_cancellation_reaches_loader() {
    let fixture = Fixture::new();
    let target = fixture.script("slow.sh", "sleep 30\n");
    let loader = fixture.summary_via_sh(true);

    let recorder = Arc::new(Recorder::default());
    loader.start(&target, JobParams::Summary, recorder.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    fixture.root.cancel();

    recorder.wait_for_end().await;
    fixture.settle().await;
    assert!(matches!(
        loader.start(&target, JobParams::Summary, recorder.clone()),
        Err(JobError::Shutdown)
    ));
}
