use serde::{Deserialize, Serialize};

/// Connection credentials for the Cync cloud.
///
/// `user_id` and `authorize` are embedded in the AUTH payload on every connect; both come
/// from the REST two-factor exchange, which the host adapter performs out-of-band.
/// `refresh_token` is carried only so the host can hand it to its REST collaborator -- this
/// library never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	#[serde(rename = "userID")]
	pub user_id: u32,
	pub authorize: String,
	#[serde(rename = "refreshToken", default)]
	pub refresh_token: String,
}
