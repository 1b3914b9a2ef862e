use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{
    auth::{self, TOKEN_TYPE},
    error::{AppError, Result},
    model::{CurrentUser, Todo},
    repository::{Repository, RepositoryError},
    schema::{CreateTodoSchema, LoginSchema, SignupSchema, TokenSchema, UpdateTodoSchema},
    AppState,
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    Json(json!({ "message": "Site is working" }))
}

fn todos_of<'a>(data: &'a AppState, user: &CurrentUser) -> Repository<'a, Todo> {
    Repository::new(&data.db).owned_by(user.id)
}

// Handler for getting all of the caller's Todo items
pub async fn get_todos(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Todo>>> {
    let todos = todos_of(&data, &user).list().await?;
    Ok(Json(todos))
}

// Handler for creating a new Todo owned by the caller
pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateTodoSchema>,
) -> Result<impl IntoResponse> {
    let todo = todos_of(&data, &user).create(body.into()).await?;
    tracing::info!(todo_id = todo.id, username = %user.username, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

// Handler for getting a specific Todo by ID
pub async fn get_todo(
    Path(id): Path<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Todo>> {
    todos_of(&data, &user)
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Todo with ID: {id} not found")))
}

// Handler for replacing a Todo by ID
pub async fn update_todo(
    Path(id): Path<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateTodoSchema>,
) -> Result<Json<Todo>> {
    let todo = todos_of(&data, &user).update(id, body.into()).await?;
    Ok(Json(todo))
}

// Handler for deleting a Todo by ID
pub async fn delete_todo(
    Path(id): Path<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    if !todos_of(&data, &user).delete(id).await? {
        return Err(RepositoryError::NotFound { entity: "Todo", id }.into());
    }

    tracing::info!(todo_id = id, username = %user.username, "todo deleted");
    Ok(Json(json!({ "message": format!("Todo {id} deleted") })))
}

pub async fn signup(
    State(data): State<Arc<AppState>>,
    Json(body): Json<SignupSchema>,
) -> Result<impl IntoResponse> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_owned(),
        ));
    }

    let user = auth::register(&data.db, &body.username, &body.email, &body.password).await?;
    let access_token = data.tokens.issue(&user)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenSchema {
            access_token,
            token_type: TOKEN_TYPE.to_owned(),
            user_id: None,
        }),
    ))
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    Json(body): Json<LoginSchema>,
) -> Result<Json<TokenSchema>> {
    let user = auth::authenticate(&data.db, &body.username, &body.password).await?;
    let access_token = data.tokens.issue(&user)?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(TokenSchema {
        access_token,
        token_type: TOKEN_TYPE.to_owned(),
        user_id: Some(user.id),
    }))
}
