use green_sched::{yield_now, Scheduler, SchedulerConfig};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

const YIELDS: u64 = 10_000;

fn cooperative() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_stack_size(64 * 1024)
        .without_preemption()
}

fn main() {
    println!("\n=== green-sched - Performance Benchmarks ===\n");

    // Benchmark 1: thread creation and teardown
    println!("Benchmark 1: Thread Creation Performance");
    println!("----------------------------------------");

    let mut scheduler = Scheduler::with_config(cooperative()).expect("valid config");
    let start = Instant::now();
    for _ in 0..256 {
        scheduler.create(|| {}).expect("create");
    }
    let creation_time = start.elapsed();
    println!("Created 256 threads in: {:?}", creation_time);
    println!("Average per thread: {:?}", creation_time / 256);

    let start = Instant::now();
    scheduler.execute().expect("execute");
    let run_time = start.elapsed();
    println!("Ran and released 256 threads in: {:?}", run_time);

    // Benchmark 2: context switching
    println!("\nBenchmark 2: Context Switch Performance");
    println!("---------------------------------------");

    let counter = Rc::new(Cell::new(0u64));
    for _ in 0..2 {
        let counter = counter.clone();
        scheduler
            .create(move || {
                for _ in 0..YIELDS {
                    counter.set(counter.get() + 1);
                    yield_now();
                }
            })
            .expect("create");
    }

    let start = Instant::now();
    scheduler.execute().expect("execute");
    let switch_time = start.elapsed();

    let metrics = scheduler.metrics();
    // every yield is two switches: out to the dispatcher and back in
    let switches = 2 * metrics.dispatches();
    println!("Total yields: {}", counter.get());
    println!("Total switches: {} in {:?}", switches, switch_time);
    println!("Average per switch: {:?}", switch_time / switches.max(1) as u32);

    // Benchmark 3: the same workload with the preemption timer installed
    println!("\nBenchmark 3: Yield With Timer Installed");
    println!("---------------------------------------");

    let config = SchedulerConfig::default().with_stack_size(64 * 1024);
    let mut scheduler = Scheduler::with_config(config).expect("valid config");
    for _ in 0..2 {
        scheduler
            .create(|| {
                for _ in 0..YIELDS {
                    yield_now();
                }
            })
            .expect("create");
    }
    let start = Instant::now();
    scheduler.execute().expect("execute");
    let timed = start.elapsed();
    println!("{} yields in {:?}", 2 * YIELDS, timed);
    println!("Average per yield: {:?}", timed / (2 * YIELDS) as u32);
}
