use std::cell::Cell;
use std::rc::Rc;

use gesit_utils::Yields;

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let mut pool = gesit::LocalPool::new();

    let count = Rc::new(Cell::new(0));
    for _ in 0..10 {
        let count = count.clone();
        pool.spawn(async move {
            Yields(1).await;
            count.set(count.get() + 1);
        });
    }

    pool.run();
    println!("ran {} tasks", count.get());
}
