use serde::de::DeserializeOwned;
use serde::Serialize;

/// A trait for converting a type that implements Serialize + Deserialize
/// to a vector of bytes and from an array of bytes back into the type.
pub trait ByteRep: Serialize + DeserializeOwned {
    fn as_bytes(&self) -> Result<Vec<u8>, serde_json::Error>;
    fn from_bytes(v: &[u8]) -> Result<Self, serde_json::Error>;
}

#[macro_export]
macro_rules! impl_ByteRep {
    (for $($t:ty), +) => {
        $(impl $crate::utils::utils::ByteRep for $t {
            fn as_bytes(&self) -> Result<Vec<u8>, ::serde_json::Error> {
                ::serde_json::to_vec(&self)
            }
            fn from_bytes(v: &[u8]) -> Result<Self, ::serde_json::Error> {
                ::serde_json::from_slice(v)
            }
        })*
    };
}

/// Serde helper that writes a byte vector as a hexadecimal string,
/// the same representation packets use for their bytes on the wire.
///
/// Use with `#[serde(with = "crate::utils::utils::hex_bytes")]`.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
