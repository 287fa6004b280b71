//! Timer-driven preemption of threads that never yield.

#![cfg(target_os = "linux")]

mod common;

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::{CountingMemory, Trace, EXECUTION};
use green_sched::preemption::PreemptionTimer;
use green_sched::{current_thread_id, yield_now, SchedError, Scheduler, SchedulerConfig};

fn preemptive(timeslice_ms: u64) -> SchedulerConfig {
    SchedulerConfig::default()
        .with_stack_size(256 * 1024)
        .with_timeslice(Duration::from_millis(timeslice_ms))
}

fn alarm_handler() -> libc::sighandler_t {
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        libc::sigaction(libc::SIGALRM, std::ptr::null(), &mut current);
        current.sa_sigaction
    }
}

fn alarm_blocked() -> bool {
    unsafe {
        let mut mask: libc::sigset_t = std::mem::zeroed();
        libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut mask);
        libc::sigismember(&mask, libc::SIGALRM) == 1
    }
}

fn alarm_pending() -> bool {
    unsafe {
        let mut pending: libc::sigset_t = std::mem::zeroed();
        libc::sigpending(&mut pending);
        libc::sigismember(&pending, libc::SIGALRM) == 1
    }
}

#[test]
fn sub_microsecond_timeslice_is_rejected() {
    let config = SchedulerConfig::default().with_timeslice(Duration::from_nanos(500));
    assert_eq!(
        Scheduler::with_config(config).err(),
        Some(SchedError::InvalidTimeslice)
    );
}

#[test]
fn disarm_discards_a_tick_that_already_fired() {
    let _serial = EXECUTION.lock();
    let timer = PreemptionTimer::install(Duration::from_secs(1)).unwrap();
    timer.arm();

    // a tick delivered while blocked, as when a thread is on its way out
    unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGALRM) };
    assert!(alarm_pending());

    timer.disarm();
    assert!(!alarm_pending());
    drop(timer);
}

#[test]
fn busy_thread_is_preempted() {
    let _serial = EXECUTION.lock();
    let released = Rc::new(AtomicBool::new(false));
    let trace = Trace::default();
    let mut scheduler = Scheduler::with_config(preemptive(10)).unwrap();

    {
        let released = released.clone();
        let trace = trace.clone();
        scheduler
            .create(move || {
                trace.push("spinner starts");
                // only another thread can end this loop
                while !released.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                trace.push("spinner released");
            })
            .unwrap();
    }
    {
        let released = released.clone();
        let trace = trace.clone();
        scheduler
            .create(move || {
                trace.push("releaser runs");
                released.store(true, Ordering::Release);
            })
            .unwrap();
    }
    scheduler.execute().unwrap();

    assert_eq!(
        trace.events(),
        ["spinner starts", "releaser runs", "spinner released"]
    );
    let metrics = scheduler.metrics();
    assert!(metrics.preemptions >= 1);
    assert_eq!(metrics.terminations, 2);
}

#[test]
fn preemption_rotates_through_all_busy_threads() {
    let _serial = EXECUTION.lock();
    const THREADS: usize = 3;
    const ROUNDS: usize = 3;
    let turn = Rc::new(AtomicUsize::new(0));
    let trace = Trace::default();
    let mut scheduler = Scheduler::with_config(preemptive(5)).unwrap();

    for me in 0..THREADS {
        let turn = turn.clone();
        let trace = trace.clone();
        scheduler
            .create(move || {
                for _ in 0..ROUNDS {
                    while turn.load(Ordering::Acquire) % THREADS != me {
                        std::hint::spin_loop();
                    }
                    trace.push(me.to_string());
                    turn.fetch_add(1, Ordering::AcqRel);
                }
            })
            .unwrap();
    }
    scheduler.execute().unwrap();

    assert_eq!(turn.load(Ordering::Acquire), THREADS * ROUNDS);
    assert_eq!(
        trace.events(),
        ["0", "1", "2", "0", "1", "2", "0", "1", "2"]
    );
    // a thread that still has rounds left only hands over when the timer fires
    assert!(scheduler.metrics().preemptions >= (THREADS * (ROUNDS - 1)) as u64);
}

#[test]
fn voluntary_and_forced_switches_mix() {
    let _serial = EXECUTION.lock();
    let stop = Rc::new(AtomicBool::new(false));
    let yields = Rc::new(AtomicUsize::new(0));
    let mut scheduler = Scheduler::with_config(preemptive(5)).unwrap();

    {
        let stop = stop.clone();
        scheduler
            .create(move || {
                while !stop.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
            })
            .unwrap();
    }
    {
        let stop = stop.clone();
        let yields = yields.clone();
        scheduler
            .create(move || {
                for _ in 0..5 {
                    yields.fetch_add(1, Ordering::AcqRel);
                    yield_now();
                }
                stop.store(true, Ordering::Release);
            })
            .unwrap();
    }
    scheduler.execute().unwrap();

    assert_eq!(yields.load(Ordering::Acquire), 5);
    let metrics = scheduler.metrics();
    assert!(metrics.voluntary_yields >= 5);
    assert!(metrics.preemptions >= 5);
    assert_eq!(metrics.terminations, 2);
}

#[test]
fn thread_identity_survives_preemption() {
    let _serial = EXECUTION.lock();
    let mismatches = Rc::new(AtomicUsize::new(0));
    let mut scheduler = Scheduler::with_config(preemptive(2)).unwrap();

    for _ in 0..3 {
        let mismatches = mismatches.clone();
        scheduler
            .create(move || {
                let me = current_thread_id();
                let start = std::time::Instant::now();
                while start.elapsed() < Duration::from_millis(30) {
                    if current_thread_id() != me {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .unwrap();
    }
    scheduler.execute().unwrap();

    assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    assert!(scheduler.metrics().preemptions >= 1);
}

#[test]
fn signal_state_is_restored_after_execute() {
    let _serial = EXECUTION.lock();
    let handler_before = alarm_handler();
    let blocked_before = alarm_blocked();

    let memory = CountingMemory::default();
    let mut scheduler = Scheduler::with_memory(preemptive(5), &memory).unwrap();
    for _ in 0..2 {
        scheduler
            .create(|| {
                let start = std::time::Instant::now();
                while start.elapsed() < Duration::from_millis(20) {
                    std::hint::spin_loop();
                }
            })
            .unwrap();
    }
    scheduler.execute().unwrap();

    assert_eq!(alarm_handler(), handler_before);
    assert_eq!(alarm_blocked(), blocked_before);
    assert!(memory.balanced());
}
