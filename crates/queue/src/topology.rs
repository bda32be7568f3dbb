use botdeck_config::QueueConfig;

use crate::{
    Result,
    transport::{QueueSpec, QueueTransport},
};

/// The three queues the platform uses.
#[derive(Debug, Clone)]
pub struct Topology {
    pub updates: QueueSpec,
    pub replies: QueueSpec,
    pub dead_letter: QueueSpec,
}

impl Topology {
    pub fn from_config(cfg: &QueueConfig) -> Self {
        Self {
            updates: QueueSpec::new(&cfg.updates),
            replies: QueueSpec::new(&cfg.replies)
                .with_dead_letter(&cfg.dead_letter, cfg.max_deliveries),
            dead_letter: QueueSpec::new(&cfg.dead_letter),
        }
    }

    /// Declare every queue, dead-letter target first.
    pub async fn declare(&self, transport: &dyn QueueTransport) -> Result<()> {
        for spec in [&self.dead_letter, &self.updates, &self.replies] {
            transport.declare(spec).await?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::memory::MemoryTransport};

    #[tokio::test]
    async fn test_default_topology() {
        let topology = Topology::from_config(&QueueConfig::default());
        assert_eq!(topology.updates.name, "telegram.updates");
        assert_eq!(topology.replies.name, "telegram.replies");
        assert_eq!(
            topology.replies.dead_letter.as_deref(),
            Some("telegram.replies.dlq")
        );
        assert!(topology.updates.dead_letter.is_none());

        let transport = MemoryTransport::new();
        topology.declare(&transport).await.unwrap();
        transport
            .publish("telegram.replies.dlq", b"x".to_vec())
            .await
            .unwrap();
    }
}
