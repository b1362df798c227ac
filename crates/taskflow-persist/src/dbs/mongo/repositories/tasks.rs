use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};
use taskflow_types::TaskStatusFilter;

use crate::dbs::mongo::models::MongoTask;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoTaskRepository {
    collection: Collection<MongoTask>,
}

impl MongoTaskRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("tasks");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, task: &MongoTask) -> Result<()> {
        self.collection.insert_one(task).await?;
        Ok(())
    }

    pub async fn list(
        &self,
        user_id: &str,
        status: TaskStatusFilter,
        limit: i64,
    ) -> Result<Vec<MongoTask>> {
        let mut filter: Document = doc! { "user_id": user_id };
        match status {
            TaskStatusFilter::All => {}
            TaskStatusFilter::Pending => {
                filter.insert("completed", false);
            }
            TaskStatusFilter::Completed => {
                filter.insert("completed", true);
            }
        }

        let tasks = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(tasks)
    }

    /// Mark complete; an already completed task is returned unchanged
    pub async fn complete(&self, user_id: &str, task_id: &str) -> Result<Option<MongoTask>> {
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": task_id, "user_id": user_id, "completed": false },
                doc! { "$set": { "completed": true, "completed_at": BsonDateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(task) => Ok(Some(task)),
            None => Ok(self
                .collection
                .find_one(doc! { "_id": task_id, "user_id": user_id })
                .await?),
        }
    }

    pub async fn delete(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": task_id, "user_id": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
