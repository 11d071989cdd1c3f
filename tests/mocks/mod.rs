#![allow(dead_code)]

mod mock_resolver;

pub use self::mock_resolver::{mock_pull, mock_push, MockHandle, MockPull, MockPush};

use futures::channel::oneshot;
use linkerd_namer::Combiner;

/// Waits until everything scheduled on `combiner` so far has run.
pub async fn settle(combiner: &Combiner) {
    let (tx, rx) = oneshot::channel();
    combiner
        .run(move |_| { let _ = tx.send(()); })
        .expect("combiner closed");
    rx.await.expect("combiner dropped work");
}

pub fn init_logging() {
    drop(env_logger::try_init());
}
