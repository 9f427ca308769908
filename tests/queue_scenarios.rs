//! Threaded end-to-end scenarios for the bounded queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use advsync::test_utils::init_test_logging;
use advsync::{BoundedQueue, SyncError, Timeout};

fn init_test(name: &str) {
    init_test_logging();
    advsync::test_phase!(name);
}

#[test]
fn single_producer_single_consumer_ordered_delivery() {
    init_test("single_producer_single_consumer_ordered_delivery");
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new());
    queue.enable(20).expect("enable");

    let producer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            for i in 0..100 {
                queue.push(i, Timeout::NEVER).expect("push");
            }
        })
    };
    let consumer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            (0..100)
                .map(|_| queue.pop(Timeout::NEVER).expect("pop"))
                .collect::<Vec<_>>()
        })
    };

    producer.join().expect("producer failed");
    let observed = consumer.join().expect("consumer failed");
    let expected: Vec<u32> = (0..100).collect();
    advsync::assert_with_log!(
        observed == expected,
        "delivery order",
        expected.len(),
        observed.len()
    );
    advsync::assert_with_log!(queue.is_empty(), "final size", 0usize, queue.len());
    advsync::test_complete!("single_producer_single_consumer_ordered_delivery");
}

#[test]
fn fill_and_drain_under_load() {
    init_test("fill_and_drain_under_load");
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new());
    queue.enable(20).expect("enable");
    queue
        .block_pushing(Timeout::NEVER)
        .expect("fence producers before they start");

    let producer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            for i in 0..100 {
                queue.push(i, Timeout::NEVER).expect("push");
            }
        })
    };
    let consumer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            for _ in 0..100 {
                queue.pop(Timeout::NEVER).expect("pop");
            }
        })
    };

    for cycle in 0..5 {
        queue.fill(Timeout::NEVER).expect("fill");
        advsync::assert_with_log!(
            queue.len() == 20,
            "full after fill",
            20usize,
            queue.len()
        );
        queue.drain(Timeout::NEVER).expect("drain");
        advsync::assert_with_log!(queue.is_empty(), "empty after drain", 0usize, queue.len());
        tracing::info!(cycle, "fill/drain cycle complete");
    }
    queue.unblock_pushing().expect("release producers");

    producer.join().expect("producer failed");
    consumer.join().expect("consumer failed");
    advsync::assert_with_log!(queue.is_empty(), "final size", 0usize, queue.len());
    advsync::test_complete!("fill_and_drain_under_load");
}

#[test]
fn dynamic_capacity_change_under_load() {
    init_test("dynamic_capacity_change_under_load");
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new());
    queue.enable(5).expect("enable");

    let producer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let mut value = 0;
            let err = loop {
                match queue.push(value, Timeout::NEVER) {
                    Ok(()) => value += 1,
                    Err(err) => break err,
                }
            };
            (value, err)
        })
    };
    let consumer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let mut observed = Vec::new();
            let err = loop {
                match queue.pop(Timeout::NEVER) {
                    Ok(value) => observed.push(value),
                    Err(err) => break err,
                }
            };
            (observed, err)
        })
    };

    std::thread::sleep(Duration::from_millis(100));
    queue.change_capacity(20, Timeout::NEVER).expect("grow");
    advsync::assert_with_log!(queue.capacity() == 20, "grown", 20u32, queue.capacity());
    std::thread::sleep(Duration::from_millis(100));
    queue.change_capacity(7, Timeout::NEVER).expect("shrink");
    advsync::assert_with_log!(queue.capacity() == 7, "shrunk", 7u32, queue.capacity());
    std::thread::sleep(Duration::from_millis(100));
    queue.disable();

    let (pushed, push_err) = producer.join().expect("producer failed");
    let (observed, pop_err) = consumer.join().expect("consumer failed");
    advsync::assert_with_log!(
        push_err == SyncError::Disabled,
        "producer stopped by disable",
        SyncError::Disabled,
        push_err
    );
    advsync::assert_with_log!(
        pop_err == SyncError::Disabled,
        "consumer stopped by disable",
        SyncError::Disabled,
        pop_err
    );
    // Single producer, single consumer: delivery is in push order with no
    // gaps up to the number of observed pops.
    for (index, value) in observed.iter().enumerate() {
        assert_eq!(*value, u32::try_from(index).expect("index fits"), "out-of-order pop");
    }
    assert!(
        observed.len() <= usize::try_from(pushed).expect("count fits"),
        "popped more than was pushed"
    );
    advsync::test_complete!(
        "dynamic_capacity_change_under_load",
        pushed = pushed,
        popped = observed.len()
    );
}

#[test]
fn timed_out_push_leaves_queue_untouched() {
    init_test("timed_out_push_leaves_queue_untouched");
    let queue: BoundedQueue<u32> = BoundedQueue::new();
    queue.enable(1).expect("enable");
    queue.push(0, Timeout::NEVER).expect("occupy the only slot");

    let started = Instant::now();
    let err = queue
        .push(1, Timeout::after(Duration::from_secs(3)))
        .expect_err("queue is full");
    let elapsed = started.elapsed();
    advsync::assert_with_log!(
        err == SyncError::UnavailableOrTimeout,
        "push timed out",
        SyncError::UnavailableOrTimeout,
        err
    );
    assert!(elapsed >= Duration::from_secs(3), "deadline honored");

    advsync::assert_with_log!(queue.len() == 1, "size unchanged", 1usize, queue.len());
    let err = queue
        .push(2, Timeout::at(Instant::now()))
        .expect_err("already-expired deadline");
    advsync::assert_with_log!(
        err == SyncError::UnavailableOrTimeout,
        "expired deadline fails without waiting",
        SyncError::UnavailableOrTimeout,
        err
    );
    let err = queue.try_push(2).expect_err("still no free slot");
    advsync::assert_with_log!(
        err == SyncError::UnavailableOrTimeout,
        "free permits unchanged",
        SyncError::UnavailableOrTimeout,
        err
    );
    let item = queue.pop(Timeout::NEVER).expect("pop");
    advsync::assert_with_log!(item == 0, "original item intact", 0u32, item);
    queue.try_push(2).expect("slot free after pop");
    advsync::test_complete!("timed_out_push_leaves_queue_untouched");
}
