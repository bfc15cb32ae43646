use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct LatchState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

/// Reader/writer latch with explicit lock and unlock calls, so acquisition
/// and release may happen in different call frames. Writer-preferring: new
/// readers queue behind a waiting writer.
///
/// The B+ tree uses one of these to guard `root_page_id` observation across
/// concurrent structural changes.
#[derive(Default)]
pub struct RwLatch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl RwLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn r_lock(&self) {
        let mut state = self.state.lock();
        while state.writer || state.waiting_writers > 0 {
            self.cond.wait(&mut state);
        }
        state.readers += 1;
    }

    pub fn r_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.readers > 0);
        state.readers -= 1;
        if state.readers == 0 {
            self.cond.notify_all();
        }
    }

    pub fn w_lock(&self) {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            self.cond.wait(&mut state);
        }
        state.waiting_writers -= 1;
        state.writer = true;
    }

    pub fn w_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.writer);
        state.writer = false;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_exclusive_writer() {
        let latch = Arc::new(RwLatch::new());
        let counter = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let latch = latch.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    latch.w_lock();
                    let mut c = counter.lock();
                    *c += 1;
                    drop(c);
                    latch.w_unlock();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), 400);
    }

    #[test]
    fn test_readers_share() {
        let latch = Arc::new(RwLatch::new());
        latch.r_lock();
        latch.r_lock();
        latch.r_unlock();
        latch.r_unlock();
        latch.w_lock();
        latch.w_unlock();
    }
}
