use mongodb::bson::doc;
use mongodb::{Client, Collection};

use crate::dbs::mongo::models::MongoSession;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoSessionRepository {
    collection: Collection<MongoSession>,
}

impl MongoSessionRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("sessions");
        Self { collection }
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<MongoSession>> {
        Ok(self.collection.find_one(doc! { "token": token }).await?)
    }
}
