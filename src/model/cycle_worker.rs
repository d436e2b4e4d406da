use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::{datasource::file_path::WORKER_THREAD, utils::constants::hotplug::WORKER_NICE};

#[derive(Default)]
struct WorkerControl {
    cancelled: bool,
}

/// 可取消的周期工作线程
/// 延迟到期后执行一次 tick，tick 返回下一次的延迟；返回 None 时线程退出
pub struct CycleWorker {
    control: Arc<(Mutex<WorkerControl>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl CycleWorker {
    pub fn spawn<F>(initial_delay: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let control = Arc::new((Mutex::new(WorkerControl::default()), Condvar::new()));
        let worker_control = Arc::clone(&control);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || {
                raise_priority();
                let (lock, cvar) = &*worker_control;
                let mut delay = initial_delay;

                loop {
                    let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    let (guard, _) = cvar
                        .wait_timeout_while(guard, delay, |c| !c.cancelled)
                        .unwrap_or_else(PoisonError::into_inner);
                    if guard.cancelled {
                        break;
                    }
                    drop(guard);

                    match tick() {
                        Some(next) => delay = next,
                        None => break,
                    }
                }
                debug!("{WORKER_THREAD} exit");
            })
            .with_context(|| format!("Failed to spawn {WORKER_THREAD} thread"))?;

        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    /// 取消后续的 tick；若 tick 正在执行则阻塞到其结束
    pub fn cancel_and_wait(&mut self) {
        let (lock, cvar) = &*self.control;
        lock.lock().unwrap_or_else(PoisonError::into_inner).cancelled = true;
        cvar.notify_all();

        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("{WORKER_THREAD} panicked");
        }
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for CycleWorker {
    fn drop(&mut self) {
        self.cancel_and_wait();
    }
}

// 对应高优先级工作队列，失败时忽略
fn raise_priority() {
    let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::id_t;
    let ret = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, WORKER_NICE) };
    if ret != 0 {
        debug!(
            "Failed to set {WORKER_THREAD} nice {WORKER_NICE}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Instant,
    };

    use super::*;

    #[test_log::test]
    fn rearms_with_returned_delay() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut worker = CycleWorker::spawn(Duration::from_millis(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 3 { None } else { Some(Duration::from_millis(1)) }
        })
        .unwrap();

        let start = Instant::now();
        while !worker.is_finished() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        worker.cancel_and_wait();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test_log::test]
    fn cancel_before_first_tick_has_no_side_effect() {
        let ticked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ticked);
        let mut worker = CycleWorker::spawn(Duration::from_secs(30), move || {
            flag.store(true, Ordering::SeqCst);
            None
        })
        .unwrap();

        let start = Instant::now();
        worker.cancel_and_wait();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!ticked.load(Ordering::SeqCst));
        assert!(worker.is_finished());
    }

    #[test_log::test]
    fn cancel_waits_for_in_flight_tick() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        let mut worker = CycleWorker::spawn(Duration::ZERO, move || {
            s.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            f.store(true, Ordering::SeqCst);
            Some(Duration::from_millis(1))
        })
        .unwrap();

        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        worker.cancel_and_wait();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test_log::test]
    fn drop_stops_worker() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = CycleWorker::spawn(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Duration::from_millis(1))
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        drop(worker);
        let after_drop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    }
}
