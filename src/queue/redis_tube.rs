// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::settings::QueueSettings;
use crate::domain::models::task::{Task, TaskData};
use crate::queue::tube::{QueueError, Tube};

/// 空队列轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// KEYS: ready, taken, delayed, tasks; ARGV: now_ms, lease_deadline_ms
const TAKE_SCRIPT: &str = r#"
local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(expired) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('RPUSH', KEYS[1], id)
end
local due = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[3], id)
  redis.call('LPUSH', KEYS[1], id)
end
while true do
  local id = redis.call('RPOP', KEYS[1])
  if not id then
    return false
  end
  local payload = redis.call('HGET', KEYS[4], id)
  if payload then
    redis.call('ZADD', KEYS[2], ARGV[2], id)
    return {id, payload}
  end
end
"#;

// KEYS: taken, tasks; ARGV: id
const ACK_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
return 1
"#;

// KEYS: taken, buried; ARGV: id
const BURY_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('LPUSH', KEYS[2], ARGV[1])
return 1
"#;

/// 基于Redis的队列通道
///
/// 键布局（前缀 `{namespace}:{tube}:`）：
/// `ready` 就绪列表，`delayed` 按到期时间排序的延迟集合，
/// `taken` 按租约截止时间排序的已取出集合，`buried` 死信列表，
/// `tasks` 任务ID到JSON数据的哈希。
#[derive(Clone)]
pub struct RedisTube {
    con: ConnectionManager,
    name: String,
    prefix: String,
    lease: Duration,
    take_script: Script,
    ack_script: Script,
    bury_script: Script,
}

impl RedisTube {
    /// 连接到队列通道
    ///
    /// # 参数
    ///
    /// * `settings` - 队列连接配置
    /// * `lease` - 任务租约时长，过期后任务重新变为就绪
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisTube)` - 队列通道
    /// * `Err(QueueError)` - 无法连接Redis
    pub async fn connect(settings: &QueueSettings, lease: Duration) -> Result<Self, QueueError> {
        let client = redis::Client::open(settings.url.as_str())?;
        let con = ConnectionManager::new(client).await?;
        debug!(tube = %settings.tube, "Connected to queue at {}", settings.url);

        Ok(Self {
            con,
            name: settings.tube.clone(),
            prefix: format!("{}:{}", settings.namespace, settings.tube),
            lease,
            take_script: Script::new(TAKE_SCRIPT),
            ack_script: Script::new(ACK_SCRIPT),
            bury_script: Script::new(BURY_SCRIPT),
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    async fn try_take(&self) -> Result<Option<(String, String)>, QueueError> {
        let mut con = self.con.clone();
        let now = Utc::now().timestamp_millis();
        let deadline = now + self.lease.as_millis() as i64;
        let taken: Option<(String, String)> = self
            .take_script
            .key(self.key("ready"))
            .key(self.key("taken"))
            .key(self.key("delayed"))
            .key(self.key("tasks"))
            .arg(now)
            .arg(deadline)
            .invoke_async(&mut con)
            .await?;
        Ok(taken)
    }

    async fn bury_id(&self, id: &str) -> Result<(), QueueError> {
        let mut con = self.con.clone();
        let moved: i64 = self
            .bury_script
            .key(self.key("taken"))
            .key(self.key("buried"))
            .arg(id)
            .invoke_async(&mut con)
            .await?;
        if moved == 0 {
            return Err(QueueError::NotTaken(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Tube for RedisTube {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((id, payload)) = self.try_take().await? {
                match TaskData::from_json(&payload) {
                    Ok(data) => return Ok(Some(Task::new(id, data))),
                    Err(e) => {
                        warn!(tube = %self.name, task_id = %id, "Burying malformed task: {}", e);
                        self.bury_id(&id).await?;
                        continue;
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, task: &Task) -> Result<(), QueueError> {
        let mut con = self.con.clone();
        let removed: i64 = self
            .ack_script
            .key(self.key("taken"))
            .key(self.key("tasks"))
            .arg(&task.id)
            .invoke_async(&mut con)
            .await?;
        if removed == 0 {
            return Err(QueueError::NotTaken(task.id.clone()));
        }
        Ok(())
    }

    async fn bury(&self, task: &Task) -> Result<(), QueueError> {
        self.bury_id(&task.id).await
    }

    async fn put(&self, data: &TaskData, delay: Duration) -> Result<String, QueueError> {
        let mut con = self.con.clone();
        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(data)?;

        let mut pipe = redis::pipe();
        pipe.atomic().hset(self.key("tasks"), &id, payload);
        if delay.is_zero() {
            pipe.lpush(self.key("ready"), &id);
        } else {
            let due = Utc::now().timestamp_millis() + delay.as_millis() as i64;
            pipe.zadd(self.key("delayed"), &id, due);
        }
        let _: () = pipe.query_async(&mut con).await?;

        debug!(tube = %self.name, task_id = %id, "Task put");
        Ok(id)
    }
}
