use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::{Client, Collection, IndexModel};
use taskflow_types::ChatMessage;

use crate::dbs::mongo::models::MongoChat;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoChatRepository {
    collection: Collection<MongoChat>,
}

impl MongoChatRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("chats");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "updated_at": -1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, chat: &MongoChat) -> Result<()> {
        self.collection.insert_one(chat).await?;
        Ok(())
    }

    /// Append to a chat owned by `user_id`; `false` if no such chat
    pub async fn push_messages(
        &self,
        chat_id: ObjectId,
        user_id: &str,
        messages: &[ChatMessage],
    ) -> Result<bool> {
        let filter = doc! { "_id": chat_id, "user_id": user_id };
        let update = doc! {
            "$push": { "messages": { "$each": bson::to_bson(messages)? } },
            "$set": { "updated_at": BsonDateTime::now() }
        };

        let result = self.collection.update_one(filter, update).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn find(&self, chat_id: ObjectId, user_id: &str) -> Result<Option<MongoChat>> {
        let filter = doc! { "_id": chat_id, "user_id": user_id };
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn list(&self, user_id: &str, limit: i64) -> Result<Vec<MongoChat>> {
        let chats = self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "updated_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(chats)
    }

    pub async fn delete(&self, chat_id: ObjectId, user_id: &str) -> Result<bool> {
        let filter = doc! { "_id": chat_id, "user_id": user_id };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
