use serde::{Deserialize, Serialize};

/// Summed power of the spectral bins inside the target band for one window.
///
/// Always non-negative for finite input.
pub type BandPower = f64;

/// A band-power reading mapped onto the integer scale `[0, 100]`.
///
/// Only constructible through [`NormalizedValue::new`], which rejects
/// anything above 100.
///
/// # Example
/// ```
/// use bc_core::value::NormalizedValue;
/// assert_eq!(NormalizedValue::new(42).map(NormalizedValue::get), Some(42));
/// assert!(NormalizedValue::new(101).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NormalizedValue(u8);

impl NormalizedValue {
    /// Upper bound of the scale.
    pub const MAX: u8 = 100;

    /// Wrap `value` if it lies in `[0, 100]`.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// The raw integer.
    #[inline]
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NormalizedValue {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("{value} hors de [0, 100]"))
    }
}

impl From<NormalizedValue> for u8 {
    fn from(value: NormalizedValue) -> Self {
        value.0
    }
}

impl std::fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The record pushed to every listener: `{"value": <0..100>}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMessage {
    /// Latest normalized band power.
    pub value: NormalizedValue,
}

impl ValueMessage {
    /// Serialize to the JSON text frame sent on the wire.
    ///
    /// # Errors
    /// Returns an error if serialization fails (never for this shape).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<NormalizedValue> for ValueMessage {
    fn from(value: NormalizedValue) -> Self {
        Self { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_single_integer_field() {
        let msg = ValueMessage::from(NormalizedValue(73));
        assert_eq!(msg.to_json().ok().as_deref(), Some(r#"{"value":73}"#));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(NormalizedValue::new(0).is_some());
        assert!(NormalizedValue::new(100).is_some());
        assert!(NormalizedValue::new(255).is_none());
        let parsed: Result<ValueMessage, _> = serde_json::from_str(r#"{"value":150}"#);
        assert!(parsed.is_err());
    }
}
