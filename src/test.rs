use crate::{AccessError, Handle, Null, RawPtr, SharedPtr, UniquePtr, WeakPtr};
use std::{
    mem::drop,
    sync::atomic::{AtomicUsize, Ordering::SeqCst},
    sync::{Arc, Barrier},
    thread,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts how many times a value has been dropped.
#[derive(Debug)]
struct Tracked {
    drops: Arc<AtomicUsize>,
    value: usize,
}

impl Tracked {
    fn new(value: usize) -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let tracked = Tracked {
            drops: Arc::clone(&drops),
            value,
        };
        (tracked, drops)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, SeqCst);
    }
}

mod raw {
    use super::*;

    #[test]
    fn t001() {
        let p = RawPtr::<i32>::null();
        assert!(p == Null);
        assert!(Null == p);
        assert!(p.get().is_null());
        assert!(p.try_get() == Err(AccessError::Null));
        assert!(p == RawPtr::default());
    }

    #[test]
    #[should_panic(expected = "Dereferencing null pointer.")]
    fn t002() {
        let p = RawPtr::<i32>::null();
        let _value: i32 = *p;
    }

    #[test]
    fn t003() {
        init();
        let mut p1 = RawPtr::new(10);
        assert!(*p1 == 10);

        unsafe { p1.destroy() };
        assert!(p1 == Null);

        unsafe { p1.reset(Some(Box::new(20))) };
        assert!(*p1 == 20);
        unsafe { p1.destroy() };
    }

    #[test]
    fn t004() {
        let (tracked, drops) = Tracked::new(1);
        let mut p1 = RawPtr::new(tracked);
        let p2 = p1;

        assert!(p1 == p2);
        assert!(p2.value == 1);

        unsafe { p1.destroy() };
        assert!(drops.load(SeqCst) == 1);
        assert!(p1 == Null);
        assert!(p2 != Null);
    }

    #[test]
    fn t005() {
        let arc = Arc::new(1);
        let mut p = RawPtr::new(Arc::clone(&arc));

        let b = unsafe { p.take_box() }.unwrap();
        assert!(p == Null);
        assert!(Arc::strong_count(&arc) == 2);

        let raw = Box::into_raw(b);
        let mut p = unsafe { RawPtr::from_raw(raw) };
        assert!(p.get() == raw);
        assert!(**p == 1);

        unsafe { p.destroy() };
        assert!(Arc::strong_count(&arc) == 1);
    }
}

mod unique {
    use super::*;

    #[test]
    fn t001() {
        let mut u = UniquePtr::<i32>::null();
        assert!(u == Null);
        assert!(u.try_get() == Err(AccessError::Null));
        assert!(u.try_get_mut().is_err());
        assert!(u.release().is_none());
        assert!(u == Null);
    }

    #[test]
    #[should_panic(expected = "Dereferencing null pointer.")]
    fn t002() {
        let mut u = UniquePtr::<i32>::null();
        *u = 1;
    }

    #[test]
    fn t003() {
        init();
        let mut u1 = UniquePtr::new(30);
        let addr = u1.get();

        let mut u2 = u1.take();
        assert!(u1 == Null);
        assert!(u2.get() == addr);
        assert!(*u2 == 30);

        u1 = UniquePtr::new(40);
        assert!(*u1 == 40);
        assert!(*u2 == 30);

        u1.reset(Some(Box::new(50)));
        assert!(*u1 == 50);

        u2 = UniquePtr::from(u1.release().unwrap());
        assert!(u1 == Null);
        assert!(*u2 == 50);
    }

    #[test]
    fn t004() {
        let arc = Arc::new(1);
        {
            let mut u = UniquePtr::new(Arc::clone(&arc));
            assert!(Arc::strong_count(&arc) == 2);

            u.reset(Some(Box::new(Arc::clone(&arc))));
            assert!(Arc::strong_count(&arc) == 2);

            u.reset(None);
            assert!(Arc::strong_count(&arc) == 1);
            assert!(u == Null);

            u.reset(Some(Box::new(Arc::clone(&arc))));
        }
        assert!(Arc::strong_count(&arc) == 1);
    }

    #[test]
    fn t005() {
        let (tracked, drops) = Tracked::new(7);
        let mut u = UniquePtr::new(tracked);
        let addr = u.get();

        unsafe { u.reset_raw(addr) };
        assert!(drops.load(SeqCst) == 0);
        assert!(u.value == 7);

        let (other, other_drops) = Tracked::new(8);
        unsafe { u.reset_raw(Box::into_raw(Box::new(other))) };
        assert!(drops.load(SeqCst) == 1);
        assert!(u.value == 8);

        unsafe { u.reset_raw(std::ptr::null_mut()) };
        assert!(other_drops.load(SeqCst) == 1);
        assert!(u == Null);
    }

    #[test]
    fn t006() {
        let (tracked, drops) = Tracked::new(3);
        let u = UniquePtr::new(tracked);

        let raw = u.into_raw();
        assert!(drops.load(SeqCst) == 0);

        let mut u = unsafe { UniquePtr::from_raw(raw) };
        assert!(u.value == 3);
        u.try_get_mut().unwrap().value = 4;
        assert!(u.value == 4);

        let inner = u.into_inner().unwrap();
        assert!(drops.load(SeqCst) == 0);
        drop(inner);
        assert!(drops.load(SeqCst) == 1);
    }

    #[test]
    fn t007() {
        let u1 = UniquePtr::new(1);
        let u2 = UniquePtr::new(1);
        assert!(*u1 == *u2);
        assert!(u1 != u2);
    }
}

mod shared {
    use super::*;

    #[test]
    fn t001() {
        let s = SharedPtr::<i32>::null();
        assert!(s == Null);
        assert!(s.try_get() == Err(AccessError::Null));
        assert!(s.strong_count() == 0);
        assert!(s.weak_count() == 0);

        let s2 = s.clone();
        assert!(s2 == Null);
        assert!(s.ptr_eq(&s2));
        assert!(s.downgrade() == Null);
    }

    #[test]
    #[should_panic(expected = "Dereferencing null pointer.")]
    fn t002() {
        let s = SharedPtr::<i32>::default();
        let _value: i32 = *s;
    }

    #[test]
    fn t003() {
        init();
        let (x, x_drops) = Tracked::new(60);
        let mut s1 = SharedPtr::new(x);
        let x_addr = s1.get();

        let s2 = s1.clone();
        assert!(s1 == s2);
        assert!(s2.get() == x_addr);
        assert!(s1.strong_count() == 2);

        let (y, y_drops) = Tracked::new(70);
        s1.reset(Some(Box::new(y)));
        assert!(s1.value == 70);
        assert!(s2.value == 60);
        assert!(s2.get() == x_addr);
        assert!(s1.strong_count() == 1);
        assert!(s2.strong_count() == 1);
        assert!(x_drops.load(SeqCst) == 0);

        drop(s2);
        assert!(x_drops.load(SeqCst) == 1);

        drop(s1);
        assert!(y_drops.load(SeqCst) == 1);
        assert!(x_drops.load(SeqCst) == 1);
    }

    #[test]
    fn t004() {
        let (tracked, drops) = Tracked::new(1);
        let mut s1 = SharedPtr::new(tracked);
        let s2 = s1.clone();
        let addr = s1.get().cast_mut();

        unsafe { s1.reset_raw(addr) };
        assert!(s1 == s2);
        assert!(s1.strong_count() == 2);
        assert!(drops.load(SeqCst) == 0);

        unsafe { s1.reset_raw(std::ptr::null_mut()) };
        assert!(s1 == Null);
        assert!(s2.strong_count() == 1);
        assert!(drops.load(SeqCst) == 0);
    }

    #[test]
    fn t005() {
        let mut s1 = SharedPtr::new(5);
        let s2 = s1.clone();

        let s3 = s1.take();
        assert!(s1 == Null);
        assert!(s3 == s2);
        assert!(s2.strong_count() == 2);
    }

    #[test]
    fn t006() {
        init();
        const OWNERS: usize = 16;

        for _ in 0..20 {
            let (tracked, drops) = Tracked::new(1);
            let s = SharedPtr::new(tracked);
            let owners: Vec<_> = (0..OWNERS).map(|_| s.clone()).collect();
            drop(s);
            assert!(owners[0].strong_count() == OWNERS);

            let barrier = Barrier::new(OWNERS);
            crossbeam::thread::scope(|scope| {
                for owner in owners {
                    let barrier = &barrier;
                    scope.spawn(move |_| {
                        assert!(owner.value == 1);
                        barrier.wait();
                        drop(owner);
                    });
                }
            })
            .unwrap();

            assert!(drops.load(SeqCst) == 1);
        }
    }

    #[test]
    fn t007() {
        {
            let s = SharedPtr::new(String::from("a"));
            assert!(s.into_inner().unwrap() == "a");
        }

        {
            let s = SharedPtr::new(String::from("c"));
            let w = s.downgrade();
            assert!(s.into_inner().unwrap() == "c");
            assert!(w.expired());
            assert!(w.lock() == Null);
        }

        assert!(SharedPtr::<i32>::null().into_inner().is_err());
    }

    #[test]
    fn t008() {
        let mut u = UniquePtr::new(9);
        let addr = u.get();

        let s = SharedPtr::from(u.take());
        assert!(s.get() == addr.cast_const());
        assert!(*s == 9);
        assert!(SharedPtr::from(u) == Null);

        let s1 = SharedPtr::new(9);
        assert!(*s1 == *s);
        assert!(s1 != s);
        assert!(!s1.ptr_eq(&s));
    }

    #[test]
    fn t009() {
        let arc = Arc::new(1);
        let raw = Box::into_raw(Box::new(Arc::clone(&arc)));

        let s = unsafe { SharedPtr::from_raw(raw) };
        assert!(s.get() == raw.cast_const());
        assert!(s.strong_count() == 1);
        drop(s);
        assert!(Arc::strong_count(&arc) == 1);

        let s = unsafe { SharedPtr::<i32>::from_raw(std::ptr::null_mut()) };
        assert!(s == Null);
    }
}

mod weak {
    use super::*;

    #[test]
    fn t001() {
        let w = WeakPtr::<i32>::new();
        assert!(w == Null);
        assert!(w.expired());
        assert!(w.lock() == Null);
        assert!(w.try_lock().unwrap_err() == AccessError::Null);
        assert!(w.strong_count() == 0);
        assert!(w == WeakPtr::default());
    }

    #[test]
    fn t002() {
        init();
        let (tracked, drops) = Tracked::new(80);
        let s = SharedPtr::new(tracked);
        let w = WeakPtr::from(&s);

        assert!(s.strong_count() == 1);
        assert!(s.weak_count() == 1);
        assert!(!w.expired());

        let s2 = w.lock();
        assert!(s2 == s);
        assert!(s2.value == 80);
        assert!(s.strong_count() == 2);

        drop(s);
        assert!(!w.expired());
        assert!(w.try_lock().unwrap().value == 80);

        drop(s2);
        assert!(drops.load(SeqCst) == 1);
        assert!(w.expired());
        assert!(w.lock() == Null);
        assert!(w.try_lock().unwrap_err() == AccessError::Expired);
        assert!(w.strong_count() == 0);
        assert!(w.weak_count() == 0);
        assert!(w != Null);
    }

    #[test]
    fn t003() {
        let s = SharedPtr::new(1);
        let w1 = s.downgrade();
        let w2 = w1.clone();
        let w3 = SharedPtr::new(1).downgrade();

        assert!(w1 == w2);
        assert!(w1 != w3);
        assert!(w1.ptr_eq(&w2));
        assert!(w1.as_ptr() == s.get());
        assert!(s.weak_count() == 2);
        assert!(w1.weak_count() == 2);

        drop(w2);
        assert!(s.weak_count() == 1);
        assert!(w3.expired());
    }

    #[test]
    fn t004() {
        let (tracked, drops) = Tracked::new(1);
        let s = SharedPtr::new(tracked);
        let weaks: Vec<_> = (0..8).map(|_| s.downgrade()).collect();

        drop(s);
        assert!(drops.load(SeqCst) == 1);
        assert!(weaks.iter().all(WeakPtr::expired));
        drop(weaks);
        assert!(drops.load(SeqCst) == 1);
    }

    #[test]
    fn t005() {
        let (tracked, drops) = Tracked::new(1);
        let s = SharedPtr::new(tracked);
        let w = s.downgrade();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let w = w.clone();
                thread::spawn(move || {
                    let s = w.lock();
                    if let Ok(value) = s.try_get() {
                        assert!(value.value == 1);
                    }
                })
            })
            .collect();
        drop(s);

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(drops.load(SeqCst) == 1);
        assert!(w.expired());
    }

    #[test]
    fn t006() {
        let s = SharedPtr::new(1);
        let w = s.downgrade();
        assert!(w == w.clone());
        drop(s);

        let s = SharedPtr::new(2);
        assert!(w.lock() == Null);
        assert!(*s == 2);
        assert!(w != s.downgrade());
    }
}

#[test]
fn handles_share_null_checks() {
    fn null_of<H: Handle>(handle: &H) -> bool {
        handle.is_null()
    }

    assert!(null_of(&RawPtr::<u8>::null()));
    assert!(null_of(&UniquePtr::<u8>::null()));
    assert!(null_of(&SharedPtr::<u8>::null()));
    assert!(null_of(&WeakPtr::<u8>::new()));
    assert!(!null_of(&SharedPtr::new(0u8)));

    assert!(AccessError::Null.to_string() == "Dereferencing null pointer.");
    assert!(AccessError::Expired.to_string() == "Dereferencing null or expired weak pointer.");
}
