//! Teacher signup/login and student join

use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Student, Teacher};
use crate::services::auth::{LoginResponse, StudentLogin, TeacherLogin, TeacherSignup};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/teacher/signup", post(teacher_signup))
        .route("/auth/teacher/login", post(teacher_login))
        .route("/auth/student/login", post(student_login))
}

async fn teacher_signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TeacherSignup>,
) -> Result<Json<Teacher>> {
    Ok(Json(state.auth.signup_teacher(request).await?))
}

async fn teacher_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TeacherLogin>,
) -> Result<Json<LoginResponse<Teacher>>> {
    Ok(Json(state.auth.login_teacher(request).await?))
}

async fn student_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StudentLogin>,
) -> Result<Json<LoginResponse<Student>>> {
    Ok(Json(state.auth.login_student(request).await?))
}
