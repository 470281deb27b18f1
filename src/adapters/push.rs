use std::collections::HashMap;

use async_trait::async_trait;
use fcm_notification::{FcmNotification, NotificationPayload};
use serde_json::{Map, Value};

use crate::adapters::{DeliveryError, PushAdapter, PushMessage};

/// Firebase Cloud Messaging, one request per device token.
pub struct FcmPushAdapter {
    client: FcmNotification,
}

impl FcmPushAdapter {
    pub fn new(credentials_path: &str) -> anyhow::Result<Self> {
        let client = FcmNotification::new(credentials_path)
            .map_err(|e| anyhow::anyhow!("Failed to create FCM client: {e:?}"))?;
        Ok(Self { client })
    }
}

/// FCM data payloads are string to string.
pub fn stringify_data(data: &Map<String, Value>) -> Vec<(String, String)> {
    data.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[async_trait]
impl PushAdapter for FcmPushAdapter {
    async fn send_push_notification(&self, message: PushMessage) -> Result<(), DeliveryError> {
        if message.tokens.is_empty() {
            return Err(DeliveryError::InvalidRecipient("no device tokens".to_string()));
        }

        let data = stringify_data(&message.data);
        let mut failures = Vec::new();

        for token in &message.tokens {
            let payload = NotificationPayload {
                token: token.as_str(),
                title: message.title.as_str(),
                body: message.body.as_str(),
                data: (!data.is_empty()).then(|| {
                    data.iter()
                        .map(|(k, v)| (k.as_str().into(), v.as_str().into()))
                        .collect::<HashMap<_, _>>()
                }),
            };

            if let Err(e) = self.client.send_notification(&payload).await {
                tracing::warn!("FCM rejected token {token}: {e}");
                failures.push(e.to_string());
            }
        }

        if failures.len() == message.tokens.len() {
            return Err(DeliveryError::Rejected(format!(
                "all {} device tokens failed: {}",
                failures.len(),
                failures.join("; ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_values_become_strings() {
        let mut data = Map::new();
        data.insert("trackId".to_string(), json!("t-1"));
        data.insert("count".to_string(), json!(3));
        data.insert("meta".to_string(), json!({"a": true}));

        let mut pairs = stringify_data(&data);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("count".to_string(), "3".to_string()),
                ("meta".to_string(), r#"{"a":true}"#.to_string()),
                ("trackId".to_string(), "t-1".to_string()),
            ]
        );
    }
}
