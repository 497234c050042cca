use crate::config::db::MongoConfig;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};

#[derive(Debug, Clone)]
pub struct InfraClients {
    pub mongo_db: Database,
}

pub const TASKS_COLLECTION: &str = "generation_tasks";
pub const USERS_COLLECTION: &str = "users";

pub async fn init_infra(mongo: Option<MongoConfig>) -> Result<Option<InfraClients>, String> {
    let Some(mongo) = mongo else {
        return Ok(None);
    };

    let client = MongoClient::with_uri_str(&mongo.url)
        .await
        .map_err(|e| format!("mongodb client init failed: {e}"))?;
    let mongo_db = client.database(&mongo.database);
    mongo_db
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| format!("mongodb ping failed: {e}"))?;
    ensure_indexes(&mongo_db).await?;
    Ok(Some(InfraClients { mongo_db }))
}

async fn ensure_indexes(db: &Database) -> Result<(), String> {
    let tasks = db.collection::<mongodb::bson::Document>(TASKS_COLLECTION);
    let indexes = vec![
        IndexModel::builder()
            .keys(doc! { "taskId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build(),
        IndexModel::builder()
            .keys(doc! { "taskId": 1, "userId": 1 })
            .build(),
    ];
    tasks
        .create_indexes(indexes)
        .await
        .map_err(|e| format!("mongodb index creation failed: {e}"))?;
    Ok(())
}
