use std::{
	collections::HashMap,
	sync::{Arc, PoisonError, RwLock},
};

use brain_service::BrainService;

/// Shared by every update handler.
pub struct BotState {
	pub service: Arc<BrainService>,
	pub admin_id: i64,
	/// Users whose next free-text message is a research topic.
	research: RwLock<HashMap<i64, bool>>,
}
impl BotState {
	pub fn new(service: Arc<BrainService>, admin_id: i64) -> Self {
		Self { service, admin_id, research: RwLock::new(HashMap::new()) }
	}

	pub fn is_admin(&self, user_id: Option<i64>) -> bool {
		user_id == Some(self.admin_id)
	}

	pub fn awaiting_research(&self, user_id: i64) -> bool {
		self.research
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&user_id)
			.copied()
			.unwrap_or(false)
	}

	pub fn set_research(&self, user_id: i64, awaiting: bool) {
		let mut research = self.research.write().unwrap_or_else(PoisonError::into_inner);

		if awaiting {
			research.insert(user_id, true);
		} else {
			research.remove(&user_id);
		}
	}
}
