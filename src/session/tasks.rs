//! Timers owned by a session.
//!
//! Every task runs under a child of the session's cancellation token and
//! re-enters the session by posting [`Event::Timer`] to its mailbox. Each
//! start gets a fresh id, so a tick that was already in flight when its task
//! was cancelled or replaced is recognised and ignored.

use super::Event;
use ahash::AHashMap;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Bedrock clients expect vehicle positions every game tick.
pub const GAME_TICK: Duration = Duration::from_millis(50);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum TimerKind {
    /// Re-sends the local player's vehicle position while riding.
    VehicleRebroadcast,
    /// Disconnects a client that has not finished spawning in time.
    LoginTimeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerId {
    pub kind: TimerKind,
    generation: u64,
}

struct Running {
    generation: u64,
    token: CancellationToken,
}

pub struct TaskSet {
    parent: CancellationToken,
    mailbox: flume::Sender<Event>,
    running: AHashMap<TimerKind, Running>,
    next_generation: u64,
}

impl TaskSet {
    pub fn new(parent: CancellationToken, mailbox: flume::Sender<Event>) -> Self {
        Self {
            parent,
            mailbox,
            running: AHashMap::new(),
            next_generation: 0,
        }
    }

    /// Fires every `period` until cancelled. Replaces a running task of the
    /// same kind.
    pub fn start_repeating(&mut self, kind: TimerKind, period: Duration) -> TimerId {
        let (id, token) = self.register(kind);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        // Ticks are skipped rather than queued behind a busy session.
                        if let Err(flume::TrySendError::Disconnected(_)) =
                            mailbox.try_send(Event::Timer(id))
                        {
                            break;
                        }
                    }
                }
            }
        });
        id
    }

    /// Fires once after `delay` unless cancelled first.
    pub fn start_once(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let (id, token) = self.register(kind);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    mailbox.send_async(Event::Timer(id)).await.ok();
                }
            }
        });
        id
    }

    fn register(&mut self, kind: TimerKind) -> (TimerId, CancellationToken) {
        self.cancel(kind);
        let generation = self.next_generation;
        self.next_generation += 1;
        let token = self.parent.child_token();
        self.running.insert(
            kind,
            Running {
                generation,
                token: token.clone(),
            },
        );
        (TimerId { kind, generation }, token)
    }

    /// Returns whether a task of this kind was running.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.running.remove(&kind) {
            Some(running) => {
                running.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, running) in self.running.drain() {
            running.token.cancel();
        }
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.running.contains_key(&kind)
    }

    /// Whether a tick with this id should still be acted on. One-shot tasks
    /// are retired by their tick.
    pub fn accept(&mut self, id: TimerId) -> bool {
        let current = self
            .running
            .get(&id.kind)
            .is_some_and(|running| running.generation == id.generation);
        if current && id.kind == TimerKind::LoginTimeout {
            self.running.remove(&id.kind);
        }
        current
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_set() -> (TaskSet, flume::Receiver<Event>) {
        let (tx, rx) = flume::bounded(16);
        (TaskSet::new(CancellationToken::new(), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_tasks_tick_until_cancelled() {
        let (mut tasks, rx) = task_set();
        let id = tasks.start_repeating(TimerKind::VehicleRebroadcast, GAME_TICK);
        for _ in 0..3 {
            let Event::Timer(fired) = rx.recv_async().await.unwrap() else {
                panic!("expected a timer event");
            };
            assert_eq!(fired, id);
            assert!(tasks.accept(fired));
        }
        assert!(tasks.cancel(TimerKind::VehicleRebroadcast));
        assert!(!tasks.accept(id));
        tokio::time::sleep(GAME_TICK * 4).await;
        // At most one tick was in flight when the task was cancelled.
        assert!(rx.drain().count() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_tasks_are_stale() {
        let (mut tasks, _rx) = task_set();
        let first = tasks.start_repeating(TimerKind::VehicleRebroadcast, GAME_TICK);
        let second = tasks.start_repeating(TimerKind::VehicleRebroadcast, GAME_TICK);
        assert!(!tasks.accept(first));
        assert!(tasks.accept(second));
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_tasks_retire_after_firing() {
        let (mut tasks, rx) = task_set();
        tasks.start_once(TimerKind::LoginTimeout, Duration::from_secs(30));
        let Event::Timer(id) = rx.recv_async().await.unwrap() else {
            panic!("expected a timer event");
        };
        assert!(tasks.accept(id));
        assert!(!tasks.is_running(TimerKind::LoginTimeout));
        assert!(!tasks.accept(id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_parent_stops_every_task() {
        let (tx, rx) = flume::bounded(16);
        let parent = CancellationToken::new();
        let mut tasks = TaskSet::new(parent.clone(), tx);
        tasks.start_once(TimerKind::LoginTimeout, Duration::from_secs(1));
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.is_empty());
    }
}
