use std::sync::Arc;

use brain_service::BrainService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BrainService>,
}
impl AppState {
	/// Connects the storage backends and prepares the database and vector collection.
	pub async fn new(config: brain_config::Config) -> color_eyre::Result<Self> {
		let service = BrainService::connect(config)?;

		service.init_storage().await?;

		Ok(Self::from_service(Arc::new(service)))
	}

	pub fn from_service(service: Arc<BrainService>) -> Self {
		Self { service }
	}

	pub fn api_token(&self) -> &str {
		&self.service.cfg.security.api_token
	}
}
