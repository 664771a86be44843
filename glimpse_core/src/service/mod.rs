pub mod collections;
pub mod comments;
pub mod content;
pub mod follows;
pub mod groups;
pub mod messages;
pub mod posts;
pub mod session;
pub mod users;
