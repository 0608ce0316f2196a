//! Dispatcher & Sender Concurrency Test
//!
//! Banyak thread publish/subscribe bersamaan, dan banyak thread mengirim
//! command lewat satu `CommandSender`. Sink test menulis byte satu per
//! satu sambil `yield_now` supaya interleaving kelihatan kalau write lock
//! tidak bekerja.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use pitwall::network::{CommandSender, DatagramSink};
use pitwall::protocol::{CarId, ClientLoaded, Command, EventTag, Message, Version};
use pitwall::{Dispatcher, EncodeError, SendError, Topic};

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

/// Satu stream byte bersama, plus batas tiap write
#[derive(Default)]
struct Capture {
    stream: Vec<u8>,
    boundaries: Vec<(usize, usize)>,
}

struct TricklingSink {
    capture: Arc<Mutex<Capture>>,
}

impl DatagramSink for TricklingSink {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
        let start = self.capture.lock().unwrap().stream.len();
        for &b in datagram {
            self.capture.lock().unwrap().stream.push(b);
            thread::yield_now();
        }
        let mut capture = self.capture.lock().unwrap();
        let end = capture.stream.len();
        capture.boundaries.push((start, end));
        Ok(())
    }
}

fn loaded(car: u8) -> Message {
    Message::ClientLoaded(ClientLoaded(CarId(car)))
}

#[test]
fn test_concurrent_sends_never_interleave() {
    let capture = Arc::new(Mutex::new(Capture::default()));
    let sender = CommandSender::new(TricklingSink {
        capture: Arc::clone(&capture),
    });
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let sender = sender.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let cmd = match i % 3 {
                        0 => Command::send_chat(CarId(t as u8), format!("thread {t} msg {i}")),
                        1 => Command::broadcast_chat(format!("broadcast {t}/{i}")),
                        _ => Command::admin_command(format!("/kick {t}")),
                    };
                    sender.send(&cmd).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let capture = capture.lock().unwrap();
    assert_eq!(capture.boundaries.len(), THREADS * PER_THREAD);
    assert_eq!(
        capture.boundaries.last().map(|&(_, end)| end),
        Some(capture.stream.len())
    );

    let mut expected_start = 0;
    for &(start, end) in &capture.boundaries {
        assert_eq!(start, expected_start, "datagrams overlap in the stream");
        let cmd = Command::decode(&capture.stream[start..end]).unwrap();
        assert!(matches!(
            cmd.event(),
            EventTag::SendChat | EventTag::BroadcastChat | EventTag::AdminCommand
        ));
        expected_start = end;
    }
}

#[test]
fn test_oversized_admin_command_writes_nothing() {
    let capture = Arc::new(Mutex::new(Capture::default()));
    let sender = CommandSender::new(TricklingSink {
        capture: Arc::clone(&capture),
    });

    let result = sender.admin_command(&"x".repeat(300));
    assert!(matches!(
        result,
        Err(SendError::Encode(EncodeError::StringTooLong { len: 300, .. }))
    ));

    let capture = capture.lock().unwrap();
    assert!(capture.stream.is_empty());
    assert!(capture.boundaries.is_empty());
}

#[test]
fn test_subscribers_run_in_subscription_order() {
    let dispatcher = Dispatcher::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "wildcard", "third"] {
        let log = Arc::clone(&log);
        let topic = if name == "wildcard" {
            Topic::All
        } else {
            Topic::Event(EventTag::ClientLoaded)
        };
        dispatcher.subscribe(topic, move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        });
    }

    let report = dispatcher.publish(&loaded(1));
    assert_eq!(report.invoked, 3);
    assert_eq!(*log.lock().unwrap(), vec!["first", "wildcard", "third"]);

    log.lock().unwrap().clear();
    dispatcher.publish(&Message::Version(Version(4)));
    assert_eq!(*log.lock().unwrap(), vec!["wildcard"]);
}

#[test]
fn test_unsubscribe_from_inside_handler() {
    let dispatcher = Arc::new(Dispatcher::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let own_id = Arc::new(Mutex::new(None));

    let id = {
        let inner = Arc::clone(&dispatcher);
        let calls = Arc::clone(&calls);
        let own_id = Arc::clone(&own_id);
        dispatcher.subscribe(EventTag::ClientLoaded, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id.lock().unwrap() {
                inner.unsubscribe(id);
            }
            Ok(())
        })
    };
    *own_id.lock().unwrap() = Some(id);

    dispatcher.publish(&loaded(1));
    dispatcher.publish(&loaded(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.subscriber_count(), 0);
}

#[test]
fn test_concurrent_subscribe_and_publish() {
    let dispatcher = Arc::new(Dispatcher::new());
    let delivered = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS * 2));

    let mut workers = Vec::new();
    for t in 0..THREADS {
        let subscriber_side = Arc::clone(&dispatcher);
        let subscriber_barrier = Arc::clone(&barrier);
        let delivered = Arc::clone(&delivered);
        workers.push(thread::spawn(move || {
            subscriber_barrier.wait();
            for _ in 0..50 {
                let delivered = Arc::clone(&delivered);
                let id = subscriber_side.subscribe(Topic::All, move |_| {
                    delivered.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                });
                assert!(subscriber_side.unsubscribe(id));
            }
            t
        }));

        let publisher_side = Arc::clone(&dispatcher);
        let publisher_barrier = Arc::clone(&barrier);
        workers.push(thread::spawn(move || {
            publisher_barrier.wait();
            for i in 0..PER_THREAD {
                publisher_side.publish(&loaded((i % 32) as u8));
            }
            t
        }));
    }
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(dispatcher.subscriber_count(), 0);
    // setelah semua unsubscribe selesai, publish tidak memanggil siapa pun
    let before = delivered.load(Ordering::Relaxed);
    let report = dispatcher.publish(&loaded(0));
    assert_eq!(report.invoked, 0);
    assert_eq!(delivered.load(Ordering::Relaxed), before);
}

#[test]
fn test_publish_report_counts_failures() {
    let dispatcher = Dispatcher::new();
    dispatcher.subscribe(EventTag::Version, |_| Err(anyhow::anyhow!("nope")));
    dispatcher.subscribe(EventTag::Version, |_| panic!("boom"));
    dispatcher.subscribe(EventTag::Version, |_| Ok(()));

    let report = dispatcher.publish(&Message::Version(Version(4)));
    assert_eq!(report.invoked, 3);
    assert_eq!(report.failed, 2);
}
