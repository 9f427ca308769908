//! Threaded end-to-end scenarios for the cyclic barrier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use advsync::test_utils::init_test_logging;
use advsync::{Barrier, SyncError, Timeout};

fn init_test(name: &str) {
    init_test_logging();
    advsync::test_phase!(name);
}

#[test]
fn five_parties_cycle_ten_times() {
    init_test("five_parties_cycle_ten_times");
    let barrier = Arc::new(Barrier::new());
    barrier.enable(5).expect("enable");
    let successes = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let barrier = Arc::clone(&barrier);
        let successes = Arc::clone(&successes);
        handles.push(std::thread::spawn(move || {
            for _ in 0..10 {
                barrier.wait(Timeout::NEVER).expect("wait");
                successes.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("party failed");
    }

    let total = successes.load(Ordering::SeqCst);
    advsync::assert_with_log!(total == 50, "successful waits", 50usize, total);
    advsync::assert_with_log!(barrier.arrived() == 0, "no stragglers", 0u32, barrier.arrived());
    advsync::test_complete!("five_parties_cycle_ten_times");
}

#[test]
fn disable_mid_cycle_releases_parked_arrivals() {
    init_test("disable_mid_cycle_releases_parked_arrivals");
    let barrier = Arc::new(Barrier::new());
    barrier.enable(5).expect("enable");

    let mut handles = Vec::new();
    for _ in 0..3 {
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || barrier.wait(Timeout::NEVER)));
    }
    std::thread::sleep(Duration::from_millis(50));
    barrier.disable();

    for handle in handles {
        let result = handle.join().expect("party failed");
        advsync::assert_with_log!(
            result == Err(SyncError::Disabled),
            "parked arrival observed disable",
            Err::<(), _>(SyncError::Disabled),
            result
        );
    }
    advsync::test_complete!("disable_mid_cycle_releases_parked_arrivals");
}
