use guardrail::{Backoff, NoopSleeper, RecordingSleeper, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SendFailure(String);

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SendFailure {}

/// In-memory writer so a test can assert on emitted tracing output.
#[derive(Debug, Default, Clone)]
struct SharedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn exhaustion_runs_three_attempts_and_keeps_the_last_error() {
    let retries = Arc::new(AtomicUsize::new(0));
    let retries_clone = retries.clone();
    // Defaults: 3 attempts, exponential backoff.
    let policy = RetryPolicy::builder()
        .on_retry(move |_: &SendFailure, _| {
            retries_clone.fetch_add(1, Ordering::SeqCst);
        })
        .with_sleeper(NoopSleeper)
        .build()
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    let result: Result<(), _> = policy
        .execute(|| {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(SendFailure(format!("smtp refused (attempt {n})")))
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(retries.load(Ordering::SeqCst), 2, "no observer call after the final attempt");
    assert_eq!(result.unwrap_err(), SendFailure("smtp refused (attempt 3)".into()));
}

#[tokio::test]
async fn one_transient_failure_then_success() {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::builder()
        .backoff(Backoff::exponential(Duration::from_millis(1000)))
        .with_sleeper(sleeper.clone())
        .build()
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    let result = policy
        .execute(|| {
            let attempts = attempts_clone.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SendFailure("timeout".into()))
                } else {
                    Ok("message-id-42")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "message-id-42");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    // The single inter-attempt delay is at least the initial delay.
    let recorded = sleeper.recorded();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0] >= Duration::from_millis(1000));
}

#[tokio::test]
async fn real_sleeper_actually_delays_between_attempts() {
    let policy = RetryPolicy::builder()
        .max_attempts(2)
        .backoff(Backoff::constant(Duration::from_millis(30)))
        .build()
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    let start = Instant::now();
    let result = policy
        .execute(|| {
            let attempts = attempts_clone.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SendFailure("flap".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn each_retry_emits_a_backoff_event() {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let policy = RetryPolicy::builder().with_sleeper(NoopSleeper).build().unwrap();
    let _: Result<(), _> =
        policy.execute(|| async { Err(SendFailure("smtp refused".into())) }).await;

    let output = writer.contents();
    // Two retries between three attempts, one event each.
    assert_eq!(output.matches("backing off before retry").count(), 2);
    assert!(output.contains("smtp refused"));
}

#[tokio::test]
async fn custom_factor_drives_the_delay_sequence() {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .backoff(
            Backoff::exponential(Duration::from_millis(100)).with_factor(3.0).unwrap(),
        )
        .with_sleeper(sleeper.clone())
        .build()
        .unwrap();

    let _: Result<(), _> =
        policy.execute(|| async { Err(SendFailure("down".into())) }).await;

    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(900),
        ]
    );
}
