// src/models/student.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'students' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: i64,

    /// Natural key (学号), unique across students.
    pub student_id: String,

    pub name: String,

    pub class_name: String,

    pub gender: String,

    pub created_at: NaiveDateTime,
}

pub const STUDENT_COLUMNS: &str = "id, student_id, name, class_name, gender, created_at";

/// DTO for creating a student.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 100, message = "姓名长度必须在1到100之间"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "学号长度必须在1到50之间"))]
    pub student_id: String,
    #[validate(length(min = 1, max = 100, message = "班级长度必须在1到100之间"))]
    pub class_name: String,
    #[validate(length(min = 1, max = 10, message = "性别长度必须在1到10之间"))]
    pub gender: String,
}

/// DTO for updating a student. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub student_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub class_name: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub gender: Option<String>,
}

impl UpdateStudentRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.student_id.is_none()
            && self.class_name.is_none()
            && self.gender.is_none()
    }
}

/// Query parameters for listing students.
#[derive(Debug, Default, Deserialize)]
pub struct StudentListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub class_name: Option<String>,
    pub gender: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Maps a requested sort key onto a real column; unknown keys sort by name.
pub fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("id") => "id",
        Some("student_id") => "student_id",
        Some("class_name") => "class_name",
        Some("gender") => "gender",
        Some("created_at") => "created_at",
        _ => "name",
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentIdRequest {
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StudentIdsRequest {
    pub student_ids: Vec<String>,
}

/// Public subset returned to the testing client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInfo {
    pub student_id: String,
    pub name: String,
    pub class_name: String,
    pub gender: String,
}

impl From<Student> for StudentInfo {
    fn from(s: Student) -> Self {
        Self {
            student_id: s.student_id,
            name: s.name,
            class_name: s.class_name,
            gender: s.gender,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentValidateResponse {
    pub exists: bool,
    pub student_info: Option<StudentInfo>,
}
