// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::task::{Task, TaskData};
use crate::queue::tube::{QueueError, Tube};

#[derive(Default)]
struct State {
    ready: VecDeque<String>,
    delayed: Vec<(Instant, String)>,
    taken: HashMap<String, Instant>,
    buried: Vec<String>,
    tasks: HashMap<String, String>,
    fail_next_take: bool,
    fail_next_put: bool,
    fail_next_ack: bool,
}

impl State {
    fn promote(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .taken
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            self.taken.remove(&id);
            self.ready.push_back(id);
        }

        let mut due = Vec::new();
        self.delayed.retain(|(at, id)| {
            if *at <= now {
                due.push(id.clone());
                false
            } else {
                true
            }
        });
        self.ready.extend(due);
    }

    fn next_wakeup(&self) -> Option<Instant> {
        self.delayed
            .iter()
            .map(|(at, _)| *at)
            .chain(self.taken.values().copied())
            .min()
    }

    fn data_of(&self, ids: impl Iterator<Item = String>) -> Vec<TaskData> {
        ids.filter_map(|id| self.tasks.get(&id))
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }
}

/// 内存队列通道
///
/// 与 Redis 实现语义一致（租约、延迟、埋葬），任务以 JSON 文本保存，
/// 取出时在队列边界完成校验。用于测试和单机运行。
pub struct MemoryTube {
    name: String,
    lease: Duration,
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryTube {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_lease(name, Duration::from_secs(300))
    }

    pub fn with_lease(name: impl Into<String>, lease: Duration) -> Self {
        Self {
            name: name.into(),
            lease,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// 放入原始 JSON 文本，不做校验
    pub fn put_raw(&self, raw: &str) -> String {
        let id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock();
            state.tasks.insert(id.clone(), raw.to_string());
            state.ready.push_back(id.clone());
        }
        self.notify.notify_one();
        id
    }

    /// 下一次 `take` 返回错误
    pub fn fail_next_take(&self) {
        self.state.lock().fail_next_take = true;
    }

    /// 下一次 `put` 返回错误
    pub fn fail_next_put(&self) {
        self.state.lock().fail_next_put = true;
    }

    /// 下一次 `ack` 返回错误
    pub fn fail_next_ack(&self) {
        self.state.lock().fail_next_ack = true;
    }

    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn delayed_len(&self) -> usize {
        self.state.lock().delayed.len()
    }

    pub fn taken_len(&self) -> usize {
        self.state.lock().taken.len()
    }

    pub fn buried_len(&self) -> usize {
        self.state.lock().buried.len()
    }

    pub fn ready_data(&self) -> Vec<TaskData> {
        let state = self.state.lock();
        state.data_of(state.ready.iter().cloned())
    }

    pub fn delayed_data(&self) -> Vec<TaskData> {
        let state = self.state.lock();
        state.data_of(state.delayed.iter().map(|(_, id)| id.clone()))
    }

    pub fn buried_data(&self) -> Vec<TaskData> {
        let state = self.state.lock();
        state.data_of(state.buried.iter().cloned())
    }

    fn try_take(&self) -> Option<(String, Result<TaskData, String>)> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.promote(now);

        let id = state.ready.pop_front()?;
        let raw = state.tasks.get(&id).cloned().unwrap_or_default();
        match TaskData::from_json(&raw) {
            Ok(data) => {
                state.taken.insert(id.clone(), now + self.lease);
                Some((id, Ok(data)))
            }
            Err(e) => {
                state.buried.push(id.clone());
                Some((id, Err(e.to_string())))
            }
        }
    }

    fn finish(&self, task: &Task) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.taken.remove(&task.id).is_none() {
            return Err(QueueError::NotTaken(task.id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Tube for MemoryTube {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError> {
        if std::mem::take(&mut self.state.lock().fail_next_take) {
            return Err(QueueError::Other("injected take failure".to_string()));
        }
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_take() {
                Some((id, Ok(data))) => return Ok(Some(Task::new(id, data))),
                Some((id, Err(e))) => {
                    warn!(tube = %self.name, task_id = %id, "Burying malformed task: {}", e);
                    continue;
                }
                None => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wake_at = self
                .state
                .lock()
                .next_wakeup()
                .map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn ack(&self, task: &Task) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_ack) {
                return Err(QueueError::Other("injected ack failure".to_string()));
            }
        }
        self.finish(task)?;
        self.state.lock().tasks.remove(&task.id);
        Ok(())
    }

    async fn bury(&self, task: &Task) -> Result<(), QueueError> {
        self.finish(task)?;
        self.state.lock().buried.push(task.id.clone());
        Ok(())
    }

    async fn put(&self, data: &TaskData, delay: Duration) -> Result<String, QueueError> {
        let payload = serde_json::to_string(data)?;
        let id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_put) {
                return Err(QueueError::Other("injected put failure".to_string()));
            }
            state.tasks.insert(id.clone(), payload);
            if delay.is_zero() {
                state.ready.push_back(id.clone());
            } else {
                state.delayed.push((Instant::now() + delay, id.clone()));
            }
        }
        self.notify.notify_one();
        Ok(id)
    }
}
