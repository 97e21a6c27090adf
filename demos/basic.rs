//! Minimal producer/consumer demo for `pagequeue`.
//!
//! Opens a queue in a temporary directory, enqueues a handful of strings
//! from one thread, and consumes them from another. Not part of the
//! library's public contract — just a smoke-testable usage sample.

use std::sync::Arc;
use std::thread;

use pagequeue::{PersistentQueue, QueueOptions};

fn main() -> pagequeue::Result<()> {
    env_logger::init();

    let dir = std::env::temp_dir().join(format!("pagequeue-demo-{}", std::process::id()));
    let queue: Arc<PersistentQueue<String>> = Arc::new(PersistentQueue::open(
        &dir,
        QueueOptions {
            capacity: 4,
            ..Default::default()
        },
    )?);

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || -> pagequeue::Result<()> {
            for i in 0..10 {
                queue.put(format!("message #{i}"))?;
            }
            Ok(())
        })
    };

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || -> pagequeue::Result<()> {
            for _ in 0..10 {
                let msg = queue.take()?;
                println!("received: {msg}");
            }
            Ok(())
        })
    };

    producer.join().expect("producer thread panicked")?;
    consumer.join().expect("consumer thread panicked")?;

    queue.close()?;
    std::fs::remove_dir_all(&dir).ok();

    Ok(())
}
