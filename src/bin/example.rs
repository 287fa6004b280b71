//! Three threads sharing one OS thread: A yields once, B returns at once,
//! C yields twice. Prints the activation trace.

use green_sched::{current_thread_name, yield_now, Scheduler, SchedulerConfig};

fn say(what: &str) {
    println!("{:>2}: {}", current_thread_name().unwrap_or("?"), what);
}

fn yields(times: usize) {
    say("runs");
    for _ in 0..times {
        say("yields");
        yield_now();
        say("resumes");
    }
    say("terminates");
}

fn main() {
    // println! is not safe to interrupt, so this demo switches cooperatively
    let config = SchedulerConfig::default().without_preemption();
    let mut scheduler = Scheduler::with_config(config).expect("valid config");

    scheduler.create_named("A", || yields(1)).expect("create A");
    scheduler.create_named("B", || yields(0)).expect("create B");
    scheduler.create_named("C", || yields(2)).expect("create C");

    scheduler.execute().expect("execute");

    let metrics = scheduler.metrics();
    println!(
        "done: {} threads, {} first activations, {} resumptions",
        metrics.threads_created, metrics.first_activations, metrics.resumptions
    );
}
