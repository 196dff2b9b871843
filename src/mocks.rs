use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tracing::instrument;

use crate::sleep::Sleeper;

/// Records requested sleeps instead of sleeping.
#[derive(Debug, Default)]
pub struct MockSleeper {
	slept: Mutex<Vec<Duration>>,
}

impl MockSleeper {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every duration passed to [`Sleeper::sleep`], in call order.
	pub fn recorded(&self) -> Vec<Duration> {
		self.slept.lock().unwrap().clone()
	}

	/// How many sleeps of exactly `duration` were requested.
	pub fn count(&self, duration: Duration) -> usize {
		self.slept.lock().unwrap().iter().filter(|d| **d == duration).count()
	}
}

#[async_trait]
impl Sleeper for MockSleeper {
	#[instrument(name = "MockSleeper::sleep", skip(self))]
	async fn sleep(&self, duration: Duration) {
		tracing::debug!(?duration, "recording mock sleep");
		self.slept.lock().unwrap().push(duration);
	}
}
