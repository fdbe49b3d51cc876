use reqwest::StatusCode;
use std::{cell::RefCell, time::Duration};
use uuid::Uuid;

use merkle_courier::prelude::*;

#[derive(Debug, Clone)]
struct Call {
    url: String,
    transfer_id: Uuid,
    items: Vec<FileEntry>,
    complete: bool,
}

/// Sender that answers from a script and records every request
struct ScriptedSender<F> {
    respond: F,
    calls: RefCell<Vec<Call>>,
}

impl<F> ScriptedSender<F>
where
    F: Fn(usize, &[FileEntry]) -> Result<StatusCode, TransportError>,
{
    fn new(respond: F) -> Self {
        ScriptedSender {
            respond,
            calls: RefCell::new(vec![]),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.calls.borrow().iter().map(|call| call.items.len()).collect()
    }
}

impl<F> BatchSender for ScriptedSender<F>
where
    F: Fn(usize, &[FileEntry]) -> Result<StatusCode, TransportError>,
{
    fn send_batch(
        &self,
        url: &str,
        transfer_id: &Uuid,
        payload: &[u8],
        complete: bool,
    ) -> Result<StatusCode, TransportError> {
        let items: Vec<FileEntry> = serde_json::from_slice(payload).unwrap();
        let attempt = self.calls.borrow().len();
        let result = (self.respond)(attempt, &items);

        self.calls.borrow_mut().push(Call {
            url: url.to_string(),
            transfer_id: *transfer_id,
            items,
            complete,
        });

        result
    }
}

fn dummy_files(count: usize) -> Vec<FileEntry> {
    (0..count)
        .map(|i| FileEntry::new(format!("{i}.txt"), format!("Hello {i}")))
        .collect()
}

fn config(batch_size: usize) -> TransportConfig {
    TransportConfig {
        batch_size,
        ..TransportConfig::default()
    }
}

#[test]
fn always_ok_sender_needs_three_batches() {
    let files = dummy_files(10_050);
    let sender = ScriptedSender::new(|_, _| Ok(StatusCode::OK));
    let clock = ManualClock::new();
    let uploader = Uploader::with_clock(&sender, &clock, config(4000));

    let mut progress = vec![];
    let transfer_id = uploader
        .upload_files("http://localhost:8080", &files, |sent| progress.push(sent))
        .unwrap();

    let calls = sender.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(sender.batch_sizes(), vec![4000, 4000, 2050]);
    assert_eq!(
        calls.iter().map(|call| call.complete).collect::<Vec<bool>>(),
        vec![false, false, true]
    );
    assert_eq!(calls[2].items.as_slice(), &files[8000..]);
    assert_eq!(progress, vec![4000, 8000, 10_050]);

    // NOTE: one transfer id for the whole run
    assert!(calls.iter().all(|call| call.transfer_id == transfer_id));
    assert!(calls
        .iter()
        .all(|call| call.url == format!("http://localhost:8080/files/upload-batch/{transfer_id}")));
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn failing_batches_halve_down_to_one() {
    let files = dummy_files(4001);
    let sender = ScriptedSender::new(|_, items: &[FileEntry]| {
        if items.len() > 1 && items[0].name == "0.txt" {
            Ok(StatusCode::SERVICE_UNAVAILABLE)
        } else {
            Ok(StatusCode::OK)
        }
    });
    let clock = ManualClock::new();
    let uploader = Uploader::with_clock(&sender, &clock, config(4000));

    let mut progress = vec![];
    uploader
        .upload_files("http://localhost:8080", &files, |sent| progress.push(sent))
        .unwrap();

    assert_eq!(
        sender.batch_sizes(),
        vec![4000, 2000, 1000, 500, 250, 125, 62, 31, 15, 7, 3, 1, 4000]
    );
    // NOTE: the next offset starts again from the default size
    assert!(sender.calls()[12].complete);
    assert_eq!(progress, vec![1, 4001]);

    let timeout = uploader.config().retry_timeout;
    assert_eq!(clock.elapsed(), Duration::from_millis(100) * 11);
    assert!(clock.elapsed() <= timeout);
}

#[test]
fn unbounded_batch_size_shrinks_without_overflow() {
    let files = dummy_files(3);
    let sender = ScriptedSender::new(|_, items: &[FileEntry]| {
        if items.len() == 1 {
            Ok(StatusCode::OK)
        } else {
            Ok(StatusCode::SERVICE_UNAVAILABLE)
        }
    });
    let clock = ManualClock::new();
    let uploader = Uploader::with_clock(&sender, &clock, config(usize::MAX));

    let mut progress = vec![];
    uploader
        .upload_files("http://localhost:8080", &files, |sent| progress.push(sent))
        .unwrap();

    assert_eq!(progress, vec![1, 2, 3]);
    assert_eq!(sender.batch_sizes()[0], 3);
    assert!(sender.calls().last().unwrap().complete);
    // NOTE: each of the first two offsets halves 63 times before a single item goes through
    assert_eq!(clock.elapsed(), Duration::from_millis(100) * 126);
}

#[test]
fn io_errors_are_retried_like_bad_statuses() {
    let files = dummy_files(3);
    let sender = ScriptedSender::new(|attempt, _| {
        if attempt == 0 {
            Err(TransportError::UnexpectedStatus(StatusCode::BAD_GATEWAY))
        } else {
            Ok(StatusCode::OK)
        }
    });
    let clock = ManualClock::new();
    let uploader = Uploader::with_clock(&sender, &clock, config(4));

    uploader.upload_files("http://store", &files, |_| {}).unwrap();

    assert_eq!(sender.batch_sizes(), vec![3, 2, 1]);
    assert_eq!(
        sender.calls().iter().map(|call| call.complete).collect::<Vec<bool>>(),
        vec![true, false, true]
    );
}

#[test]
fn exhausted_budget_fails_without_rolling_back() {
    let files = dummy_files(10);
    let sender = ScriptedSender::new(|attempt, _| {
        if attempt == 0 {
            Ok(StatusCode::OK)
        } else {
            Ok(StatusCode::INTERNAL_SERVER_ERROR)
        }
    });
    let clock = ManualClock::new();
    let uploader = Uploader::with_clock(&sender, &clock, config(4));

    let mut progress = vec![];
    let err = uploader
        .upload_files("http://localhost:8080", &files, |sent| progress.push(sent))
        .unwrap_err();

    match err {
        TransportError::UploadFailed {
            offset,
            attempts,
            timeout,
            last_failure,
            ..
        } => {
            assert_eq!(offset, 4);
            assert_eq!(timeout, Duration::from_secs(30));
            assert_eq!(last_failure.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
            // NOTE: 30s of 100ms pauses, plus the attempt that found the budget spent
            assert_eq!(attempts, 301);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(progress, vec![4]);
    assert!(clock.elapsed() <= Duration::from_secs(30));
    assert!(sender.batch_sizes()[1..].iter().all(|size| *size <= 4));
    assert_eq!(*sender.batch_sizes().last().unwrap(), 1);
}

#[test]
fn empty_file_set_sends_nothing() {
    let sender = ScriptedSender::new(|_, _| Ok(StatusCode::OK));
    let uploader = Uploader::with_clock(&sender, ManualClock::new(), config(4000));

    uploader.upload_files("http://store", &[], |_| {}).unwrap();

    assert!(sender.calls().is_empty());
}

#[test]
fn every_run_gets_its_own_transfer_id() {
    let files = dummy_files(2);
    let sender = ScriptedSender::new(|_, _| Ok(StatusCode::OK));
    let uploader = Uploader::with_clock(&sender, ManualClock::new(), config(4000));

    let first = uploader.upload_files("http://store", &files, |_| {}).unwrap();
    let second = uploader.upload_files("http://store", &files, |_| {}).unwrap();

    assert_ne!(first, second);
    assert_eq!(first.get_version_num(), 7);
}
