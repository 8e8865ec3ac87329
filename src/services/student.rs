//! Student lookups

use std::sync::Arc;

use crate::backend::DataStore;
use crate::error::{AppError, Result};
use crate::models::Student;

pub struct StudentService {
    store: Arc<dyn DataStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn list_session_students(&self, session_id: i64) -> Result<Vec<Student>> {
        self.store.list_session_students(session_id).await
    }

    pub async fn get_student(&self, student_id: i64) -> Result<Student> {
        self.store
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".into()))
    }
}
