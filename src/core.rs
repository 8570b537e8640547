use std::{
    cell::{Cell, OnceCell, RefCell},
    future::{poll_fn, Future},
    mem::{replace, take},
    rc::Rc,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll, Wake, Waker},
    thread::AccessError,
};

use futures::future::LocalBoxFuture;
use slabmap::SlabMap;

use crate::Subscription;


thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    is_runtime_exists: bool,
    jobs: Vec<Job>,
    tasks: SlabMap<Rc<LocalTask>>,
    next_task_id: u64,
    need_wake: bool,
    wakes: WakeRequests,
}
impl Globals {
    fn new() -> Self {
        Self {
            is_runtime_exists: false,
            jobs: Vec::new(),
            tasks: SlabMap::new(),
            next_task_id: 0,
            need_wake: false,
            wakes: WakeRequests::default(),
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn try_with<T>(f: impl FnOnce(&mut Self) -> T) -> Result<T, AccessError> {
        GLOBALS.try_with(|g| f(&mut g.borrow_mut()))
    }
    fn assert_exists(&self) {
        if !self.is_runtime_exists {
            panic!("`Runtime` is not created.");
        }
    }
    fn push_job(&mut self, job: Job) {
        self.assert_exists();
        self.jobs.push(job);
        self.wake();
    }
    fn get_jobs(jobs: &mut Vec<Job>) -> bool {
        Self::with(|g| {
            g.apply_wake();
            std::mem::swap(jobs, &mut g.jobs);
        });
        !jobs.is_empty()
    }
    fn apply_wake(&mut self) {
        let keys = take(&mut self.wakes.lock().wakes);
        for (key, id) in keys {
            if self.tasks.get(key).is_some_and(|t| t.id == id) {
                self.jobs.push(Job::Poll { key, id });
            }
        }
    }
    fn insert_task(&mut self, future: LocalBoxFuture<'static, ()>) -> TaskKey {
        self.assert_exists();
        let id = self.next_task_id;
        self.next_task_id += 1;
        let task = Rc::new(LocalTask {
            id,
            waker: OnceCell::new(),
            future: RefCell::new(Some(future)),
            is_polling: Cell::new(false),
        });
        let key = self.tasks.insert(task.clone());
        let wakes = self.wakes.clone();
        let _ = task.waker.set(Arc::new(RawWake { wakes, key, id }).into());
        self.push_job(Job::Poll { key, id });
        TaskKey { key, id }
    }
    fn remove_task(&mut self, key: TaskKey) -> Option<Rc<LocalTask>> {
        if self.tasks.get(key.key)?.id == key.id {
            self.tasks.remove(key.key)
        } else {
            None
        }
    }
    fn wait_for_ready(&mut self, cx: &Context) -> Poll<()> {
        self.need_wake = false;
        if !self.jobs.is_empty() {
            return Poll::Ready(());
        }
        let mut wakes = self.wakes.lock();
        if !wakes.wakes.is_empty() {
            return Poll::Ready(());
        }
        wakes.waker = Some(cx.waker().clone());
        self.need_wake = true;
        Poll::Pending
    }
    fn wake(&mut self) {
        if !self.need_wake {
            return;
        }
        self.need_wake = false;
        self.wakes.lock().wake();
    }
}

/// Cooperative single-threaded runtime.
///
/// Queued actions and spawned futures only make progress inside [`update`](Self::update),
/// so everything observed by one call runs on this thread in a well-defined order.
#[derive_ex::derive_ex(Default)]
#[default(Self::new())]
pub struct Runtime {
    jobs_buffer: Vec<Job>,
}
impl Runtime {
    pub fn new() -> Self {
        if Globals::with(|g| replace(&mut g.is_runtime_exists, true)) {
            panic!("Only one `Runtime` can exist in the same thread at the same time.");
        }
        Self {
            jobs_buffer: Vec::new(),
        }
    }

    /// Run queued actions and poll woken tasks until nothing is ready.
    ///
    /// Returns `true` if anything was run.
    pub fn update(&mut self) -> bool {
        let mut handled = false;
        let mut jobs = take(&mut self.jobs_buffer);
        while Globals::get_jobs(&mut jobs) {
            for job in jobs.drain(..) {
                job.run();
                handled = true;
            }
        }
        self.jobs_buffer = jobs;
        handled
    }

    /// Number of spawned futures that have not completed yet.
    pub fn pending_tasks(&self) -> usize {
        Globals::with(|g| g.tasks.len())
    }

    /// Wait while there is nothing for [`update`](Self::update) to do.
    pub async fn wait_for_ready(&mut self) {
        poll_fn(|cx| Globals::with(|g| g.wait_for_ready(cx))).await
    }

    /// Block the current thread, running [`update`](Self::update) until every spawned future has finished.
    pub fn run_until_idle(&mut self) {
        loop {
            self.update();
            if self.pending_tasks() == 0 {
                break;
            }
            futures::executor::block_on(self.wait_for_ready());
        }
    }

    fn cancel_tasks(&mut self) {
        while let Ok((jobs, tasks)) = Globals::try_with(|g| (take(&mut g.jobs), take(&mut g.tasks))) {
            if jobs.is_empty() && tasks.is_empty() {
                break;
            }
            drop(jobs);
            for (_, task) in tasks {
                task.cancel();
            }
        }
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        self.cancel_tasks();
        let _ = Globals::try_with(|g| {
            g.is_runtime_exists = false;
            g.need_wake = false;
            g.wakes.lock().wakes.clear();
        });
    }
}

/// Queue a closure to run on the next [`Runtime::update`] turn.
pub fn spawn_action(f: impl FnOnce() + 'static) {
    Globals::with(|g| g.push_job(Job::Action(Box::new(f))))
}

/// Spawn a detached future.
///
/// The future is first polled on the next [`Runtime::update`] turn, never inside this call.
pub fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    Globals::with(|g| g.insert_task(Box::pin(fut)));
}

/// Spawn a future that is dropped when the returned [`Subscription`] ends.
pub fn spawn_local_scoped(fut: impl Future<Output = ()> + 'static) -> Subscription {
    let key = Globals::with(|g| g.insert_task(Box::pin(fut)));
    Subscription::from_fn(move || {
        if let Ok(Some(task)) = Globals::try_with(|g| g.remove_task(key)) {
            task.cancel();
        }
    })
}

#[derive(Clone, Copy)]
struct TaskKey {
    key: usize,
    id: u64,
}

enum Job {
    Action(Box<dyn FnOnce()>),
    Poll { key: usize, id: u64 },
}
impl Job {
    fn run(self) {
        match self {
            Job::Action(f) => f(),
            Job::Poll { key, id } => {
                let task = Globals::with(|g| g.tasks.get(key).filter(|t| t.id == id).cloned());
                if let Some(task) = task {
                    task.poll(TaskKey { key, id });
                }
            }
        }
    }
}

struct LocalTask {
    id: u64,
    waker: OnceCell<Waker>,
    future: RefCell<Option<LocalBoxFuture<'static, ()>>>,
    is_polling: Cell<bool>,
}
impl LocalTask {
    fn poll(self: Rc<Self>, key: TaskKey) {
        let Some(waker) = self.waker.get() else {
            return;
        };
        if self.is_polling.replace(true) {
            return;
        }
        let mut cx = Context::from_waker(waker);
        let is_ready = match &mut *self.future.borrow_mut() {
            Some(fut) => fut.as_mut().poll(&mut cx).is_ready(),
            None => true,
        };
        self.is_polling.set(false);
        let is_registered = Globals::with(|g| g.tasks.get(key.key).is_some_and(|t| t.id == key.id));
        if is_ready || !is_registered {
            if is_registered {
                Globals::with(|g| g.remove_task(key));
            }
            self.cancel();
        }
    }
    fn cancel(&self) {
        if self.is_polling.get() {
            return;
        }
        let fut = self.future.borrow_mut().take();
        drop(fut);
    }
}

#[derive(Clone, Default)]
struct WakeRequests(Arc<Mutex<RawWakeRequests>>);

impl WakeRequests {
    fn lock(&self) -> MutexGuard<RawWakeRequests> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
struct RawWakeRequests {
    wakes: Vec<(usize, u64)>,
    waker: Option<Waker>,
}
impl RawWakeRequests {
    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

struct RawWake {
    wakes: WakeRequests,
    key: usize,
    id: u64,
}

impl Wake for RawWake {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref()
    }
    fn wake_by_ref(self: &Arc<Self>) {
        let mut requests = self.wakes.lock();
        requests.wakes.push((self.key, self.id));
        requests.wake();
    }
}
