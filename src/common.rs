use anyhow::Context;
use clap::ValueEnum;
use serde::{Serialize, de::DeserializeOwned};

/// Wire encoding of queued notification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MessageFormat {
    /// JSON serialization using serde
    #[default]
    Json,
    /// MessagePack serialization using serde (named fields)
    Msgpack,
}

impl MessageFormat {
    pub fn encode<T: Serialize>(&self, value: &T) -> anyhow::Result<Vec<u8>> {
        match self {
            MessageFormat::Json => serde_json::to_vec(value).context("Failed to serialize JSON"),
            MessageFormat::Msgpack => {
                rmp_serde::to_vec_named(value).context("Failed to serialize MessagePack")
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> anyhow::Result<T> {
        match self {
            MessageFormat::Json => {
                serde_json::from_slice(bytes).context("Failed to deserialize JSON")
            }
            MessageFormat::Msgpack => {
                rmp_serde::from_slice(bytes).context("Failed to deserialize MessagePack")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageWithOffset<T> {
    /// The deserialized message
    pub message: T,
    /// Kafka message offset
    pub offset: i64,
    /// Kafka partition number
    pub partition: i32,
    /// Kafka topic name
    pub topic: String,
}
