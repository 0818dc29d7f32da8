//! Word pipeline: producer → lower-case workers → title-case → sink.
//!
//! Runs with a two second deadline; the endless counter branch shows the
//! deadline unwinding every worker.

use std::time::Duration;

use pipeweld::prelude::*;

fn to_title(s: String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => s,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let pipeline = Pipeline::new()
        .buffer_size(4)
        .deadline(Duration::from_secs(2));

    let words = pipeline.from_iter(vec!["FOO", "BAR", "BAX"]);
    let lower = pipeline.parallel(words, 0, || {
        MapFn::new("lower", |s: &'static str| s.to_lowercase())
    });
    let title = pipeline.map("title", lower, to_title);

    let counter = pipeline.from_iter(0u64..);
    let ticks = pipeline.stage(
        counter,
        ThenFn::new("tick", |i: u64| async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(format!("Counter at: {}", i))
        }),
    );

    let both = pipeline.merge(vec![title, ticks]);
    for_each(&pipeline, both, |line| async move {
        println!("sink: {}", line);
    })
    .await?;

    println!("Done");
    pipeline.wait().await
}
