use coroflow::task::Task;
use coroflow::time::sleep;
use coroflow::{Runtime, RuntimeBuilder, yield_now};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[test]
#[should_panic(expected = "event_budget must be > 0")]
fn zero_event_budget_is_rejected() {
    let _ = RuntimeBuilder::new().event_budget(0);
}

#[test]
#[should_panic(expected = "max_park must be non-zero")]
fn zero_max_park_is_rejected() {
    let _ = RuntimeBuilder::new().max_park(Duration::ZERO);
}

#[test]
fn block_on_returns_the_output() {
    let runtime = Runtime::default();

    let value = runtime.block_on(async {
        sleep(Duration::from_millis(5)).await;
        "done"
    });

    assert_eq!(value, "done");
}

#[test]
#[should_panic(expected = "exploded inside block_on")]
fn block_on_propagates_panics() {
    let runtime = RuntimeBuilder::new().build();
    runtime.block_on(async {
        panic!("exploded inside block_on");
    });
}

#[test]
#[should_panic(expected = "block_on called from within a running task")]
fn nested_block_on_panics() {
    let runtime = Rc::new(RuntimeBuilder::new().build());
    let inner = runtime.clone();

    runtime.block_on(async move {
        inner.block_on(async {});
    });
}

#[test]
fn yield_now_interleaves_tasks() {
    let runtime = RuntimeBuilder::new().build();
    let log = Rc::new(RefCell::new(Vec::new()));

    let spawn = |name: &'static str| {
        let log = log.clone();
        runtime.spawn(async move {
            log.borrow_mut().push(format!("{name}0"));
            yield_now().await;
            log.borrow_mut().push(format!("{name}1"));
        })
    };

    let a = spawn("a");
    let b = spawn("b");

    runtime.block_on(async move {
        a.await.unwrap();
        b.await.unwrap();
    });

    assert_eq!(*log.borrow(), ["a0", "b0", "a1", "b1"]);
}

#[test]
fn runtimes_are_reusable() {
    let runtime = RuntimeBuilder::new()
        .event_budget(4)
        .max_park(Duration::from_millis(5))
        .build();

    for n in 0..3 {
        let value = runtime.block_on(async move {
            sleep(Duration::from_millis(2)).await;
            n * 10
        });
        assert_eq!(value, n * 10);
    }
}

#[coroflow::test(event_budget = 1)]
async fn small_event_budget_still_drives_every_task() {
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            Task::spawn(async move {
                for _ in 0..n {
                    yield_now().await;
                }
                n
            })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }

    assert_eq!(total, (0..8).sum::<i32>());
}
