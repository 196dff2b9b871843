use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

pub type BoxedSleeper = Arc<dyn Sleeper>;
/// The only suspension points of a run go through here, so tests can observe them.
#[async_trait]
pub trait Sleeper: Send + Sync {
	async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}
