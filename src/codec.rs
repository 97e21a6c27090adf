use crate::error::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};

/// The serialization seam between user-level elements and the raw bytes the
/// paged log stores. `encode`/`decode` run outside the queue lock, so
/// implementations must be `Send + Sync`.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Default codec used when a queue is opened without an explicit [`Codec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl<T> Codec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| Error::Codec(e.to_string()))
    }
}
