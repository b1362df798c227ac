use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use taskflow_types::{start_of_local_day, Plan};

use crate::dbs::mongo::models::MongoUser;
use crate::error::{PersistError, Result};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoUserRepository {
    collection: Collection<MongoUser>,
}

impl MongoUserRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("users");
        Self { collection }
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<MongoUser>> {
        Ok(self.collection.find_one(doc! { "_id": user_id }).await?)
    }

    /// Atomic reset-aware increment.
    ///
    /// Same-day records are `$inc`-ed. Stale or missing records are reset
    /// to 1 with an upsert; if a concurrent request created the record
    /// first, the upsert hits a duplicate key and the increment is retried.
    pub async fn record_prompt(&self, user_id: &str, now: DateTime<Utc>) -> Result<MongoUser> {
        let day_start = BsonDateTime::from_chrono(start_of_local_day(now));
        let now = BsonDateTime::from_chrono(now);

        for _ in 0..2 {
            let same_day = self
                .collection
                .find_one_and_update(
                    doc! { "_id": user_id, "last_prompt_date": { "$gte": day_start } },
                    doc! {
                        "$inc": { "prompts_used_today": 1_i64 },
                        "$set": { "last_prompt_date": now }
                    },
                )
                .return_document(ReturnDocument::After)
                .await?;
            if let Some(user) = same_day {
                return Ok(user);
            }

            let reset = self
                .collection
                .find_one_and_update(
                    doc! {
                        "_id": user_id,
                        "$or": [
                            { "last_prompt_date": { "$lt": day_start } },
                            { "last_prompt_date": null }
                        ]
                    },
                    doc! {
                        "$set": { "prompts_used_today": 1_i64, "last_prompt_date": now },
                        "$setOnInsert": { "plan": Plan::Free.as_str() }
                    },
                )
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;

            match reset {
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {}
                Err(e) if is_duplicate_key(&e) => {
                    tracing::debug!(user_id, "Concurrent usage reset, retrying increment");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PersistError::Internal(format!(
            "Failed to record prompt for user {}",
            user_id
        )))
    }

    pub async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "plan": plan.as_str() } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
