use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use cradle_schema::ShellEvent;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Topic {
    ServerError,
    ContentError,
}

impl Topic {
    pub fn from_event(event: &ShellEvent) -> Self {
        match event {
            ShellEvent::ServerError { .. } => Topic::ServerError,
            ShellEvent::ContentError { .. } => Topic::ContentError,
        }
    }
}

type Subscriber = mpsc::Sender<ShellEvent>;

/// In-process error-report channel between the server/coordinator and the
/// UI layer. Publishing never blocks; a subscriber that stops draining its
/// queue loses events rather than stalling the publisher.
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<ShellEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, event: ShellEvent) -> Result<()> {
        publish_to(&self.subscribers, event).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

/// Cloneable publish-only handle, handed to components that report errors
/// but never subscribe.
#[derive(Clone)]
pub struct BusPublisher {
    subscribers: Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>,
}

impl BusPublisher {
    pub async fn publish(&self, event: ShellEvent) -> Result<()> {
        publish_to(&self.subscribers, event).await
    }
}

async fn publish_to(
    subscribers: &RwLock<HashMap<Topic, Vec<Subscriber>>>,
    event: ShellEvent,
) -> Result<()> {
    let topic = Topic::from_event(&event);
    let subs = subscribers.read().await;
    if let Some(subscribers) = subs.get(&topic) {
        for tx in subscribers {
            if tx.try_send(event.clone()).is_err() {
                tracing::warn!(?topic, "dropping shell event for slow subscriber");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn publish_to_no_subscribers_succeeds() {
        let bus = EventBus::new(8);
        let result = bus.publish(ShellEvent::server_error("bind lost")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::ServerError).await;

        bus.publish(ShellEvent::server_error("read failed"))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, ShellEvent::ServerError { .. }));
        assert_eq!(received.message(), "read failed");
    }

    #[tokio::test]
    async fn multiple_subscribers_same_topic() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe(Topic::ContentError).await;
        let mut rx2 = bus.subscribe(Topic::ContentError).await;

        bus.publish(ShellEvent::content_error("init threw"))
            .await
            .unwrap();

        for rx in [&mut rx1, &mut rx2] {
            let got = timeout(Duration::from_millis(100), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(got, ShellEvent::ContentError { .. }));
        }
    }

    #[tokio::test]
    async fn different_topics_no_crosstalk() {
        let bus = EventBus::new(8);
        let mut server_rx = bus.subscribe(Topic::ServerError).await;

        bus.publish(ShellEvent::content_error("init threw"))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), server_rx.recv()).await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn bus_publisher_clone_works() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::ServerError).await;
        let publisher = bus.publisher().clone();

        publisher
            .publish(ShellEvent::server_error("read failed"))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, ShellEvent::ServerError { .. }));
    }
}
