use crate::repository::Entity;

// Data model representing a registered user
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    #[serde(skip_serializing)]
    pub(crate) hashed_password: String,
}

impl Entity for User {
    const NAME: &'static str = "User";
    const TABLE: &'static str = "user";
    const FIELDS: &'static [&'static str] = &["username", "email", "hashed_password"];

    fn id(&self) -> i64 {
        self.id
    }
}

// Data model representing a Todo item
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Todo {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) done: bool,
    pub(crate) user_id: Option<i64>,
}

impl Entity for Todo {
    const NAME: &'static str = "Todo";
    const TABLE: &'static str = "todo";
    const FIELDS: &'static [&'static str] = &["title", "description", "done", "user_id"];
    const OWNER: Option<&'static str> = Some("user_id");

    fn id(&self) -> i64 {
        self.id
    }
}

// Identity extracted from a verified access token
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub(crate) id: i64,
    pub(crate) username: String,
}
