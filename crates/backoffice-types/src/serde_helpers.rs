//! Serde helpers for patch inputs.

/// Distinguishes an absent field from an explicit `null` in a patch.
///
/// `None` = leave unchanged, `Some(None)` = clear, `Some(Some(v))` = set.
/// Use together with `#[serde(default)]`.
pub(crate) mod double_option {
	use serde::{Deserialize, Deserializer};

	pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
	where
		T: Deserialize<'de>,
		D: Deserializer<'de>,
	{
		Option::<T>::deserialize(deserializer).map(Some)
	}
}
