pub mod chats;
pub mod sessions;
pub mod tasks;
pub mod users;

pub use chats::MongoChatRepository;
pub use sessions::MongoSessionRepository;
pub use tasks::MongoTaskRepository;
pub use users::MongoUserRepository;
