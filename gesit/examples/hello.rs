use std::time::Duration;

use futures_timer::Delay;

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let pool = gesit::ThreadPool::new().unwrap();

    let mut handles = Vec::new();
    for i in 0..4u64 {
        let handle = pool
            .spawn(async move {
                Delay::new(Duration::from_millis(100 * i)).await;
                println!("Hello World {}", i);
                i
            })
            .unwrap();
        handles.push(handle);
    }

    for handle in handles {
        gesit::block_on(handle).unwrap();
    }
}
