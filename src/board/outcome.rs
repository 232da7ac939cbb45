//! Tagged result schema shared by every mutation endpoint and the HTTP client.
//!
//! On the wire an outcome is either `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Nothing else is accepted.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(String),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(error) => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Outcome", 2)?;
        match self {
            Self::Success(data) => {
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
            }
            Self::Failure(error) => {
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
            }
        }
        s.end()
    }
}

#[derive(Deserialize)]
struct OutcomeWire<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Outcome<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = OutcomeWire::<T>::deserialize(deserializer)?;
        match (wire.success, wire.data, wire.error) {
            (true, Some(data), None) => Ok(Self::Success(data)),
            (true, None, _) => Err(de::Error::custom("successful outcome is missing `data`")),
            (true, Some(_), Some(_)) => Err(de::Error::custom(
                "successful outcome must not carry `error`",
            )),
            (false, _, Some(error)) => Ok(Self::Failure(error)),
            (false, _, None) => Err(de::Error::custom("failed outcome is missing `error`")),
        }
    }
}
