pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Service unavailable: {message}")]
	Unavailable { message: String },
}
impl From<brain_storage::Error> for Error {
	fn from(err: brain_storage::Error) -> Self {
		match err {
			brain_storage::Error::NotFound(message) => Self::NotFound { message },
			brain_storage::Error::Conflict(message) => Self::Conflict { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
impl From<brain_providers::Error> for Error {
	fn from(err: brain_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<serde_yaml::Error> for Error {
	fn from(err: serde_yaml::Error) -> Self {
		Self::InvalidRequest { message: format!("Failed to render frontmatter: {err}.") }
	}
}
