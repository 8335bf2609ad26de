use coroflow::bridge::{Outcome, Signal, make_awaiter, make_generator_awaiter, wait_for_operation};
use coroflow::generator::GeneratorState;
use coroflow::sources::Deferred;
use coroflow::task::Task;
use coroflow::time::sleep;
use coroflow::{GeneratorError, WaitError};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures_lite::future::poll_once;

/// Emits `value` on `signal` after `delay`, from a detached task.
fn emit_later<A: 'static>(signal: &Rc<Signal<A>>, delay: Duration, value: A) {
    let signal = signal.clone();
    Task::new(async move {
        sleep(delay).await;
        signal.emit(value);
    })
    .detach();
}

#[coroflow::test]
async fn awaiter_resolves_with_the_emitted_value() {
    let signal = Rc::new(Signal::<u32>::new());
    emit_later(&signal, Duration::from_millis(10), 42);

    let mut awaiter = make_awaiter(&signal, None);
    assert!(!awaiter.ready());

    assert_eq!((&mut awaiter).await, Some(42));
    assert_eq!(awaiter.outcome(), Some(Outcome::Emitted));
    assert!(awaiter.did_suspend());
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn tuple_arguments_arrive_together() {
    let signal = Rc::new(Signal::<(i32, String)>::new());
    emit_later(&signal, Duration::from_millis(5), (3, String::from("exited")));

    let args = make_awaiter(&signal, Some(Duration::from_secs(5))).await;
    assert_eq!(args, Some((3, String::from("exited"))));
}

#[coroflow::test]
async fn awaiter_times_out_and_disconnects() {
    let signal = Signal::<u32>::new();

    let mut awaiter = make_awaiter(&signal, Some(Duration::from_millis(20)));
    assert_eq!((&mut awaiter).await, None);

    assert_eq!(awaiter.outcome(), Some(Outcome::TimedOut));
    assert!(awaiter.did_suspend());
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn destroying_the_source_wakes_the_awaiter() {
    let signal = Signal::<u32>::new();
    let waiting = make_awaiter(&signal, None).into_result();

    Task::new(async move {
        sleep(Duration::from_millis(10)).await;
        drop(signal);
    })
    .detach();

    assert_eq!(waiting.await, Err(WaitError::SourceDestroyed));
}

#[coroflow::test]
async fn closing_the_source_wakes_the_awaiter() {
    let signal = Rc::new(Signal::<u32>::new());

    {
        let signal = signal.clone();
        Task::new(async move {
            sleep(Duration::from_millis(10)).await;
            signal.close();
        })
        .detach();
    }

    let mut waiting = make_awaiter(&signal, Some(Duration::from_secs(5))).into_result();
    assert_eq!((&mut waiting).await, Err(WaitError::SourceClosed));
    assert_eq!(waiting.outcome(), Some(Outcome::SourceClosed));
    assert!(waiting.did_suspend());
}

#[coroflow::test]
async fn dead_sources_resolve_without_suspending() {
    let closed = Signal::<u32>::new();
    closed.close();

    let mut awaiter = make_awaiter(&closed, Some(Duration::from_secs(1)));
    assert!(awaiter.ready());
    assert_eq!(poll_once(&mut awaiter).await, Some(None));
    assert!(!awaiter.did_suspend());
    assert_eq!(awaiter.outcome(), Some(Outcome::SourceClosed));

    let destroyed = Signal::<u32>::new();
    let mut awaiter = make_awaiter(&destroyed, None);
    drop(destroyed);

    assert!(awaiter.ready());
    assert_eq!(poll_once(&mut awaiter).await, Some(None));
    assert!(!awaiter.did_suspend());
    assert_eq!(awaiter.outcome(), Some(Outcome::SourceDestroyed));
}

/// Awaits `signal` with a zero timeout from a spawned task.
fn race(signal: &Rc<Signal<u32>>) -> Task<(Option<u32>, Option<Outcome>)> {
    let signal = signal.clone();
    Task::spawn(async move {
        let mut awaiter = make_awaiter(&signal, Some(Duration::ZERO));
        let value = (&mut awaiter).await;
        (value, awaiter.outcome())
    })
}

#[coroflow::test]
async fn emission_before_an_expired_timer_wins() {
    let signal = Rc::new(Signal::<u32>::new());
    let waiting = race(&signal);
    assert_eq!(signal.receiver_count(), 1);

    // Both triggers are due; the emission runs first.
    signal.emit(7);
    signal.emit(8);

    assert_eq!(waiting.await, Ok((Some(7), Some(Outcome::Emitted))));
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn expired_timer_before_an_emission_wins() {
    let signal = Rc::new(Signal::<u32>::new());
    let waiting = race(&signal);

    sleep(Duration::from_millis(5)).await;
    assert_eq!(signal.receiver_count(), 0);
    signal.emit(7);

    assert_eq!(waiting.await, Ok((None, Some(Outcome::TimedOut))));
}

#[coroflow::test]
async fn dropping_an_awaiting_task_disconnects() {
    let signal = Rc::new(Signal::<u32>::new());

    let task = {
        let signal = signal.clone();
        Task::spawn(async move { make_awaiter(&signal, Some(Duration::from_secs(10))).await })
    };
    assert_eq!(signal.receiver_count(), 1);

    drop(task);
    assert_eq!(signal.receiver_count(), 0);

    // Nothing is left to resume.
    signal.emit(1);
}

#[coroflow::test]
async fn awaiting_tasks_resume_in_connection_order() {
    let signal = Rc::new(Signal::<u32>::new());
    let order = Rc::new(RefCell::new(Vec::new()));

    // Connections that came and went before the waiters.
    let earlier = signal.connect(|_| {});
    let later = signal.connect(|_| {});
    for connection in [earlier, later].into_iter().flatten() {
        assert!(connection.disconnect());
    }

    let waiter = |name: &'static str| {
        let signal = signal.clone();
        let order = order.clone();
        Task::spawn(async move {
            make_awaiter(&signal, None).await;
            order.borrow_mut().push(name);
        })
    };

    let first = waiter("first");
    let second = waiter("second");
    assert_eq!(signal.receiver_count(), 2);

    signal.emit(1);
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(*order.borrow(), ["first", "second"]);
}

#[coroflow::test]
async fn generator_awaiter_buffers_every_emission() {
    let signal = Rc::new(Signal::<u32>::new());
    let mut values = make_generator_awaiter(&signal, None);

    signal.emit(1);
    signal.emit(2);

    {
        let signal = signal.clone();
        Task::new(async move {
            for n in 3..=5 {
                sleep(Duration::from_millis(5)).await;
                signal.emit(n);
            }
            signal.emit(6);
            signal.close();
        })
        .detach();
    }

    let mut seen = Vec::new();
    while let Some(value) = values.next().await {
        seen.push(value.unwrap());
    }

    assert_eq!(seen, [1, 2, 3, 4, 5, 6]);
    assert_eq!(values.state(), GeneratorState::Finished);
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn generator_awaiter_ends_when_the_source_is_destroyed() {
    let signal = Signal::<&'static str>::new();
    let mut lines = make_generator_awaiter(&signal, None);

    signal.emit("first");
    drop(signal);

    assert_eq!(lines.next().await, Some(Ok("first")));
    assert_eq!(lines.next().await, None);
}

#[coroflow::test]
async fn generator_awaiter_times_out() {
    let signal = Signal::<u32>::new();
    let mut values = make_generator_awaiter(&signal, Some(Duration::from_millis(20)));

    signal.emit(1);

    assert_eq!(values.next().await, Some(Ok(1)));
    assert_eq!(
        values.next().await,
        Some(Err(GeneratorError::Body(WaitError::TimedOut)))
    );
    assert_eq!(values.next().await, None);

    assert_eq!(values.state(), GeneratorState::FinishedWithError);
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn unread_emissions_are_released_with_the_generator() {
    let signal = Signal::<Rc<u32>>::new();
    let payload = Rc::new(0);

    let values = make_generator_awaiter(&signal, None);
    for _ in 0..3 {
        signal.emit(payload.clone());
    }

    // The signal's own copy is dropped after each emission.
    assert_eq!(Rc::strong_count(&payload), 4);

    drop(values);
    assert_eq!(Rc::strong_count(&payload), 1);
    assert_eq!(signal.receiver_count(), 0);
}

#[coroflow::test]
async fn generator_awaiter_on_a_closed_source_is_empty() {
    let signal = Signal::<u32>::new();
    signal.close();

    let mut values = make_generator_awaiter(&signal, None);
    assert!(values.begin().await.unwrap().is_end());
}

#[coroflow::test]
async fn operation_already_complete_does_not_suspend() {
    let reply = Deferred::new();
    reply.resolve(5);

    let mut waiting = wait_for_operation(&reply, None);
    assert_eq!((&mut waiting).await, Some(5));
    assert!(!waiting.did_suspend());
}

#[coroflow::test]
async fn operation_resolved_later() {
    let reply = Deferred::new();

    {
        let reply = reply.clone();
        Task::new(async move {
            sleep(Duration::from_millis(10)).await;
            reply.resolve(String::from("pong"));
        })
        .detach();
    }

    let mut waiting = wait_for_operation(&reply, Some(Duration::from_secs(5)));
    assert_eq!((&mut waiting).await, Some(String::from("pong")));
    assert!(waiting.did_suspend());
}

#[coroflow::test]
async fn abandoned_or_late_operations_yield_nothing() {
    let abandoned = Deferred::<u32>::new();

    {
        let abandoned = abandoned.clone();
        Task::new(async move {
            sleep(Duration::from_millis(5)).await;
            abandoned.abandon();
        })
        .detach();
    }

    assert_eq!(wait_for_operation(&abandoned, None).await, None);

    let never = Deferred::<u32>::new();
    let late = wait_for_operation(&never, Some(Duration::from_millis(10))).await;
    assert_eq!(late, None);
    assert_eq!(never.finished().receiver_count(), 0);
}
