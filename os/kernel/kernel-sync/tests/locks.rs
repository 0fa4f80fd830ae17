use kernel_sync::{IrqCell, IrqGuard, SpinMutex, SyncOnceCell, interrupts_enabled};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

#[test]
fn irq_guards_nest() {
    assert!(interrupts_enabled());
    {
        let _outer = IrqGuard::new();
        {
            let _inner = IrqGuard::new();
            assert!(!interrupts_enabled());
        }
        // The inner guard found them disabled and leaves them so.
        assert!(!interrupts_enabled());
    }
    assert!(interrupts_enabled());
}

#[test]
fn contended_irq_mutex_is_exclusive() {
    let threads = 8;
    let iters = 2_000;

    let lock = Arc::new(SpinMutex::new(0usize));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let in_cs = Arc::clone(&in_cs);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    {
                        let mut v = lock.lock_irq();
                        assert!(!interrupts_enabled());
                        let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0, "mutual exclusion violated");
                        *v += 1;
                        in_cs.fetch_sub(1, Ordering::SeqCst);
                    }
                    assert!(interrupts_enabled());
                    thread::yield_now();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(*lock.lock(), threads * iters);
}

#[test]
fn irq_mutex_is_released_on_panic() {
    let m = SpinMutex::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let mut g = m.lock_irq();
        *g = 123;
        panic!("boom");
    }));
    assert!(res.is_err(), "expected panic");

    assert!(interrupts_enabled());
    assert_eq!(*m.lock(), 123);
}

#[test]
fn once_cell_initializes_once() {
    static CELL: SyncOnceCell<u32> = SyncOnceCell::new();
    let calls = AtomicUsize::new(0);

    assert!(CELL.get().is_none());
    for _ in 0..3 {
        let v = CELL.get_or_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        });
        assert_eq!(*v, 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn irq_cell_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let c = IrqCell::new(0u8);
    takes_sync(&c);

    let _g = IrqGuard::new();
    c.with(|v| *v = 9);
    assert_eq!(c.with(|v| *v), 9);
}
