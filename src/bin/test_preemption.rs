//! Two threads that never yield. Without the timer the first would run
//! forever; with it they take turns every 100ms until both hit their budget.

use green_sched::{current_thread_id, Scheduler, SchedulerConfig};
use std::time::{Duration, Instant};

fn print_str(msg: &[u8]) {
    // raw write(2): the timer may interrupt us anywhere, stdout's lock included
    unsafe {
        libc::write(1, msg.as_ptr().cast(), msg.len());
    }
}

fn busy_loop(label: &'static [u8]) {
    let start = Instant::now();
    let mut last_report = start;
    let mut counter = 0u64;
    while start.elapsed() < Duration::from_millis(600) {
        counter = counter.wrapping_add(1);
        if last_report.elapsed() >= Duration::from_millis(50) {
            print_str(label);
            last_report = Instant::now();
        }
    }
    std::hint::black_box(counter);
    print_str(b"thread finished\n");
}

fn main() {
    print_str(b"Starting preemption test...\n");

    let config = SchedulerConfig::default().with_timeslice(Duration::from_millis(100));
    let mut scheduler = Scheduler::with_config(config).expect("valid config");

    scheduler
        .create(|| busy_loop(b"Thread 1 still running\n"))
        .expect("create thread 1");
    scheduler
        .create(|| busy_loop(b"Thread 2 still running\n"))
        .expect("create thread 2");

    scheduler.execute().expect("execute");

    let metrics = scheduler.metrics();
    assert!(current_thread_id().is_none());
    println!(
        "preemptions: {}, resumptions: {}",
        metrics.preemptions, metrics.resumptions
    );
}
