use crate::repository::Fields;

// Struct representing the request body for creating a new Todo
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CreateTodoSchema {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
    pub user_id: Option<i64>,
}

// Struct representing the request body for replacing a Todo
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct UpdateTodoSchema {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
    pub user_id: Option<i64>,
}

impl From<CreateTodoSchema> for Fields {
    fn from(body: CreateTodoSchema) -> Self {
        Fields::new()
            .set("title", body.title)
            .set("description", body.description)
            .set("done", body.done)
            .set("user_id", body.user_id)
    }
}

impl From<UpdateTodoSchema> for Fields {
    fn from(body: UpdateTodoSchema) -> Self {
        Fields::new()
            .set("title", body.title)
            .set("description", body.description)
            .set("done", body.done)
            .set("user_id", body.user_id)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SignupSchema {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct LoginSchema {
    pub username: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct TokenSchema {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}
