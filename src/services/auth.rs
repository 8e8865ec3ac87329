//! Teacher signup/login and student join-by-code

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use crate::backend::DataStore;
use crate::error::{AppError, Result};
use crate::models::{NewStudent, NewTeacher, Student, Teacher, UserType};

#[derive(Debug, Clone, Deserialize)]
pub struct TeacherSignup {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeacherLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentLogin {
    pub name: String,
    pub class_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse<U> {
    pub user: U,
    pub message: String,
    pub user_type: UserType,
}

/// SHA-256 hex digest, the format stored in the `teachers.password` column
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Class codes are compared trimmed and upper-cased
pub fn normalize_class_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(value)
}

pub struct AuthService {
    store: Arc<dyn DataStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn signup_teacher(&self, request: TeacherSignup) -> Result<Teacher> {
        let name = required(&request.name, "name")?;
        let email = required(&request.email, "email")?;
        if request.password.is_empty() {
            return Err(AppError::InvalidRequest("password is required".into()));
        }

        if self.store.find_teacher_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Teacher already exists".into()));
        }

        let teacher = self
            .store
            .create_teacher(NewTeacher {
                name: name.to_string(),
                email: email.to_string(),
                password: hash_password(&request.password),
            })
            .await?;

        info!(teacher_id = teacher.id, "Teacher registered");
        Ok(teacher)
    }

    pub async fn login_teacher(&self, request: TeacherLogin) -> Result<LoginResponse<Teacher>> {
        let teacher = self
            .store
            .find_teacher_by_email(request.email.trim())
            .await?
            .filter(|teacher| teacher.password == hash_password(&request.password))
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

        info!(teacher_id = teacher.id, "Teacher logged in");
        Ok(LoginResponse {
            message: format!("Welcome, {}!", teacher.name),
            user: teacher,
            user_type: UserType::Teacher,
        })
    }

    /// Join the session behind a class code, reusing an existing student record
    pub async fn login_student(&self, request: StudentLogin) -> Result<LoginResponse<Student>> {
        let name = required(&request.name, "name")?.to_string();
        let class_code = normalize_class_code(&request.class_code);

        let session = self
            .store
            .find_session_by_code(&class_code)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid class code".into()))?;

        if session.is_expired(Utc::now()) {
            return Err(AppError::Unauthorized("Class code has expired".into()));
        }

        let student = match self.store.find_student(&name, &class_code).await? {
            Some(student) => student,
            None => {
                let student = self
                    .store
                    .create_student(NewStudent {
                        name: name.clone(),
                        class_code: class_code.clone(),
                        session_id: session.id,
                    })
                    .await?;
                info!(student_id = student.id, session_id = session.id, "Student joined session");
                student
            }
        };

        Ok(LoginResponse {
            message: format!("Welcome, {}!", name),
            user: student,
            user_type: UserType::Student,
        })
    }
}
