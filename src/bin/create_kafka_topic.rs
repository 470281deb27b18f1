use eyre::Result;
use fanout_notify_service::config::APP_CONFIG;
use fanout_notify_service::core::kafka_service::consumers::streams::configure_ssl;
use fanout_notify_service::enums::KafkaTopic;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;

fn env_or(name: &str, default: i32) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    println!("========== Creating kafka topics for notification ==========");
    create_kafka_topics_for_notification().await?;

    Ok(())
}

async fn create_kafka_topics_for_notification() -> Result<()> {
    let kafka_config = APP_CONFIG.kafka_config();
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &kafka_config.kafka_brokers);
    if kafka_config.kafka_ssl_enabled {
        configure_ssl(&mut client_config, &kafka_config);
    }
    let admin_client: AdminClient<DefaultClientContext> = client_config.create()?;

    let partitions = env_or("KAFKA_NUMBER_OF_USER_PARTITIONS", 1);
    let replication = env_or("KAFKA_REPLICATION_FACTOR", 1);

    let topics = [
        KafkaTopic::NotificationIngress.to_string(),
        KafkaTopic::NotificationDeadLetter.to_string(),
    ];

    let new_topics: Vec<NewTopic> = topics
        .iter()
        .map(|topic| {
            NewTopic::new(topic, partitions, TopicReplication::Fixed(replication))
                .set("retention.ms", "604800000") // 7 days
                .set("cleanup.policy", "delete")
        })
        .collect();

    let results = admin_client
        .create_topics(&new_topics, &AdminOptions::new())
        .await?;

    for result in results {
        match result {
            Ok(topic) => println!("Successfully created topic: {topic}"),
            Err((topic, e)) => {
                if e.to_string().contains("already exists") {
                    println!("Topic {topic} already exists, skipping...");
                } else {
                    println!("Error creating topic {topic}: {e}");
                }
            }
        }
    }

    Ok(())
}
