pub mod message;
pub mod telegram;

#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    fn sink_name(&self) -> &'static str;

    async fn send(&self, text: &str) -> anyhow::Result<()>;
}
