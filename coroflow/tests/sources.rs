use coroflow::bridge::{make_awaiter, wait_for_operation};
use coroflow::sources::{Deferred, Timer, Worker};
use coroflow::task::Task;
use coroflow::time::sleep;
use coroflow::{TaskError, WaitError};

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

#[coroflow::test]
async fn inactive_timer_counts_as_complete() {
    let timer = Timer::single_shot(Duration::from_millis(20));
    assert!(!timer.is_active());

    let mut waiting = wait_for_operation(&timer, None);
    assert_eq!((&mut waiting).await, Some(()));
    assert!(!waiting.did_suspend());
}

#[coroflow::test]
async fn single_shot_timer_completes_once() {
    let timer = Timer::single_shot(Duration::from_millis(20));
    timer.start();
    assert!(timer.is_active());

    let mut waiting = wait_for_operation(&timer, Some(Duration::from_secs(5)));
    assert_eq!((&mut waiting).await, Some(()));
    assert!(waiting.did_suspend());
    assert!(!timer.is_active());
}

#[coroflow::test]
async fn repeating_timer_fires_until_stopped() {
    let timer = Timer::new(Duration::from_millis(10));
    let fired = Rc::new(Cell::new(0));

    {
        let fired = fired.clone();
        timer.timeout().connect(move |_| fired.set(fired.get() + 1));
    }

    timer.start();
    sleep(Duration::from_millis(55)).await;
    timer.stop();

    let count = fired.get();
    assert!((3..=6).contains(&count), "fired {count} times");
    assert!(!timer.is_active());

    sleep(Duration::from_millis(30)).await;
    assert_eq!(fired.get(), count);
}

#[coroflow::test]
async fn dropping_a_timer_destroys_its_signal() {
    let timer = Timer::single_shot(Duration::from_secs(10));
    timer.start();

    let waiting = Task::spawn(make_awaiter(timer.timeout(), None).into_result());
    drop(timer);

    assert_eq!(waiting.await, Ok(Err(WaitError::SourceDestroyed)));
}

#[coroflow::test]
async fn worker_resumes_the_loop_thread() {
    let loop_thread = thread::current().id();

    let value = Worker::spawn(|| {
        thread::sleep(Duration::from_millis(20));
        6 * 7
    })
    .await;

    assert_eq!(value, Ok(42));
    assert_eq!(thread::current().id(), loop_thread);
}

#[coroflow::test]
async fn worker_panics_are_reported() {
    let worker = Worker::<u32>::spawn(|| panic!("worker failed"));

    assert_eq!(worker.await, Err(TaskError::Panicked("worker failed".into())));
}

#[test]
fn deferred_keeps_the_first_value() {
    let reply = Deferred::new();
    let seen = Rc::new(Cell::new(0));

    {
        let seen = seen.clone();
        reply.finished().connect(move |value| seen.set(*value));
    }

    assert!(!reply.is_finished());
    assert!(reply.resolve(1));
    assert!(!reply.resolve(2));

    assert!(reply.is_finished());
    assert_eq!(reply.value(), Some(1));
    assert_eq!(seen.get(), 1);
}
