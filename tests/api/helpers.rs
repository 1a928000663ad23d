use async_trait::async_trait;
use secrecy::Secret;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use travisbot::{
    ApplicationSettings, NotificationSink, NotifyError, Settings, StoreError, Subscription,
    SubscriptionStore, TelegramSettings, TravisSettings, UserId, WatcherSettings,
};

/// Subscription store backed by a map, counting build writes.
#[derive(Default)]
pub struct InMemoryStore {
    subscriptions: Mutex<BTreeMap<UserId, Subscription>>,
    build_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn with(subscriptions: Vec<Subscription>) -> Self {
        let store = Self::default();
        for subscription in subscriptions {
            store.insert(subscription);
        }
        store
    }

    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.user_id, subscription);
    }

    pub fn get(&self, user_id: i64) -> Option<Subscription> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&UserId::new(user_id))
            .cloned()
    }

    pub fn build_writes(&self) -> usize {
        self.build_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn list_watched(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.watching)
            .cloned()
            .collect())
    }

    async fn update_build(
        &self,
        user_id: UserId,
        prev_build: Option<i64>,
        curr_build: i64,
    ) -> Result<(), StoreError> {
        self.build_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(subscription) = self.subscriptions.lock().unwrap().get_mut(&user_id) {
            subscription.prev_build = prev_build;
            subscription.curr_build = Some(curr_build);
        }
        Ok(())
    }

    async fn set_watching(&self, user_id: UserId, watching: bool) -> Result<(), StoreError> {
        if let Some(subscription) = self.subscriptions.lock().unwrap().get_mut(&user_id) {
            subscription.watching = watching;
        }
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: UserId,
        source_url: &str,
        status_url: &str,
    ) -> Result<(), StoreError> {
        self.insert(Subscription::new(user_id, source_url, status_url));
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.subscriptions.lock().unwrap().remove(&user_id).is_some())
    }
}

/// Notification sink that remembers every message.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingSink {
    pub fn messages_for(&self, user_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == UserId::new(user_id))
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}

pub fn test_settings(api_base_url: String) -> Settings {
    Settings {
        application: ApplicationSettings { port: 0 },
        telegram: TelegramSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            bot_token: Secret::new("123:test-token".to_string()),
            timeout_seconds: 1,
        },
        watcher: WatcherSettings {
            interval_seconds: 1,
            fetch_timeout_seconds: 1,
            max_in_flight: 4,
        },
        travis: TravisSettings { api_base_url },
    }
}

pub fn build_json(number: i64, state: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "build": {"number": number.to_string(), "state": state, "message": message}
    })
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

pub struct TestApp {
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn serve(router: axum::Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
        }
    }

    pub fn get_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn send_text(&self, chat_id: i64, text: &str) -> reqwest::Response {
        self.client
            .post(self.get_url("/webhook"))
            .json(&serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 1,
                    "chat": {"id": chat_id, "type": "private"},
                    "text": text
                }
            }))
            .send()
            .await
            .unwrap()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
