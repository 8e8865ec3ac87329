use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::models::Student;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/student/session/:session_id/students", get(session_students))
        .route("/student/:student_id", get(get_student))
}

async fn session_students(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<Vec<Student>>> {
    Ok(Json(state.student.list_session_students(session_id).await?))
}

async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<i64>,
) -> Result<Json<Student>> {
    Ok(Json(state.student.get_student(student_id).await?))
}
