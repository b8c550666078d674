use std::sync::Arc;
use std::time::Duration;

use bloc_core::prelude::*;
use bloc_devtools::Timeline;
use tokio::task::LocalSet;

#[derive(Clone, Debug, PartialEq, Default)]
struct Counter {
    count: i32,
    loading: bool,
}

#[derive(Clone, Debug, PartialEq, Default)]
struct Parity {
    even: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct Screen {
    title: String,
    busy: bool,
}

fn parity_of(_: &Parity, (counter,): &(Counter,)) -> Parity {
    Parity {
        even: counter.count % 2 == 0,
    }
}

fn screen((counter, parity): &(Counter, Parity)) -> Screen {
    let kind = if parity.even { "even" } else { "odd" };
    Screen {
        title: format!("Count: {} ({kind})", counter.count),
        busy: counter.loading,
    }
}

fn increment(counter: &Bloc<Counter>) {
    counter.update(|s| Counter {
        count: s.count + 1,
        ..s.clone()
    });
}

/// Pretends to fetch the next value from a slow backend.
fn fetch(counter: &Bloc<Counter>) -> JobTask<i32, JobCancelled> {
    counter.update(|s| Counter {
        loading: true,
        ..s.clone()
    });
    let c = counter.clone();
    let done = counter.clone();
    counter.effect(
        Effect::new("fetch", move |job| async move {
            job.delay(Duration::from_millis(500)).await?;
            increment(&c);
            Ok::<_, JobCancelled>(c.state().count)
        })
        .on_done(move |outcome| {
            // A superseded fetch leaves the flag to its successor.
            if matches!(outcome, Err(err) if err.is_cancelled()) {
                return;
            }
            done.update(|s| Counter {
                loading: false,
                ..s.clone()
            });
        }),
    )
}

async fn run() -> anyhow::Result<()> {
    let timeline = Arc::new(Timeline::new(64));

    let counter = Bloc::builder(Counter::default())
        .name("Counter")
        .inspector(timeline.clone())
        .on_start(|_| {
            log::info!("counter started");
            Ok(())
        })
        .on_dispose(|_| {
            log::info!("counter disposed");
            Ok(())
        })
        .build();
    let parity = Interactor::builder(Parity::default(), (counter.clone(),))
        .name("Parity")
        .computed(parity_of)
        .inspector(timeline.clone())
        .build();
    let view = Coordinator::new((counter.clone(), parity.clone()), screen)
        .react(|s| log::debug!("screen changed: {s:?}"));

    // Three updates with nobody watching, then a subscriber sees the latest value.
    for _ in 0..3 {
        increment(&counter);
    }
    let sub = view.subscribe(|s| println!("{}{}", s.title, if s.busy { " ..." } else { "" }))?;

    let first = fetch(&counter);
    let second = fetch(&counter);
    match first.await {
        Err(err) if err.is_cancelled() => println!("first fetch was superseded"),
        other => println!("first fetch: {other:?}"),
    }
    println!("second fetch returned {}", second.await?);

    let ticker = counter.scope().launch(|job| async move {
        let mut ticks = 0;
        while job.delay(Duration::from_secs(1)).await.is_ok() {
            ticks += 1;
        }
        Ok::<u32, JobCancelled>(ticks)
    });

    sub.unsubscribe()?;
    println!("ticker cancelled: {}", ticker.await.is_err());
    println!("after dispose: {:?} / {:?}", counter.state(), parity.state());

    print!("{}", timeline.summary());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    LocalSet::new().block_on(&rt, run())
}
