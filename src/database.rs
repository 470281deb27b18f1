use std::time::Duration;

use wither::Model;
use wither::bson::{Document, doc};
use wither::mongodb::options::IndexOptions;
use wither::mongodb::{self, Database, IndexModel};

use crate::models::notification::Notification;
use crate::models::user_preferences::UserPreferences;

pub async fn connection(db_uri: &str, db_name: &str) -> Result<Database, mongodb::error::Error> {
    let client = mongodb::Client::with_uri_str(db_uri).await?;
    Ok(client.database(db_name))
}

/// Creates the indexes both collections rely on. Idempotent.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let notifications = db.collection::<Document>(Notification::COLLECTION_NAME);
    notifications
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "userId": 1, "createdAt": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "userId": 1, "read": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "expiresAt": 1 })
                .options(
                    IndexOptions::builder()
                        .expire_after(Duration::from_secs(0))
                        .build(),
                )
                .build(),
        ])
        .await?;

    let preferences = db.collection::<Document>(UserPreferences::COLLECTION_NAME);
    preferences
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    tracing::info!("MongoDB indexes are in place");
    Ok(())
}
