// tests/api_tests.rs

mod common;

use common::{ADMIN_USERNAME, spawn_app};
use reqwest::multipart;
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let missing = app.client.get(app.url("/api/students")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 401);
    assert_eq!(missing.headers()["www-authenticate"], "Bearer");

    let garbage = app
        .client
        .get(app.url("/api/dashboard/stats"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status().as_u16(), 401);
}

#[tokio::test]
async fn login_issues_token_and_audits_attempts() {
    let app = spawn_app().await;

    let bad = app
        .client
        .post(app.url("/token"))
        .header("X-Forwarded-For", "10.1.2.3")
        .form(&[("username", ADMIN_USERNAME), ("password", "wrong")])
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);
    let body: Value = bad.json().await.unwrap();
    assert_eq!(body["error"], "用户名或密码不正确");

    let token = app.token().await;

    let me: Value = app
        .client
        .get(app.url("/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], ADMIN_USERNAME);
    assert!(me.get("hashed_password").is_none());

    let logs: Vec<(String, String, String)> =
        sqlx::query_as("SELECT username, login_ip, status FROM login_logs ORDER BY id")
            .fetch_all(&app.pool)
            .await
            .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0], ("admin".to_string(), "10.1.2.3".to_string(), "fail".to_string()));
    assert_eq!(logs[1].0, "admin");
    assert_eq!(logs[1].1, "127.0.0.1");
    assert_eq!(logs[1].2, "success");
}

#[tokio::test]
async fn student_crud_flow() {
    let app = spawn_app().await;
    let token = app.token().await;

    // Create
    let created = app.create_student(&token, "S001", "张三", "一班").await;
    assert_eq!(created["student_id"], "S001");

    // Duplicate
    let dup = app
        .client
        .post(app.url("/api/students"))
        .bearer_auth(&token)
        .json(&json!({"student_id": "S001", "name": "李四", "class_name": "二班", "gender": "女"}))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status().as_u16(), 400);
    let body: Value = dup.json().await.unwrap();
    assert_eq!(body["error"], "学号 S001 已存在");

    // Validation
    let invalid = app
        .client
        .post(app.url("/api/students"))
        .bearer_auth(&token)
        .json(&json!({"student_id": "", "name": "x", "class_name": "y", "gender": "男"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);

    // Missing field and broken JSON get the JSON error body too.
    let missing_field = app
        .client
        .post(app.url("/api/students"))
        .bearer_auth(&token)
        .json(&json!({"student_id": "S009", "name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_field.status().as_u16(), 400);
    let body: Value = missing_field.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("class_name"));

    let broken = app
        .client
        .post(app.url("/api/students"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{\"student_id\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(broken.status().as_u16(), 400);
    let body: Value = broken.json().await.unwrap();
    assert!(body["error"].is_string());

    // Read, both paths
    for path in ["/api/students/S001", "/api/students/info/S001"] {
        let student: Value = app
            .client
            .get(app.url(path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(student["name"], "张三");
    }

    let missing = app
        .client
        .get(app.url("/api/students/NOPE"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    // Partial update
    let updated: Value = app
        .client
        .put(app.url("/api/students/S001"))
        .bearer_auth(&token)
        .json(&json!({"class_name": "三班"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["class_name"], "三班");
    assert_eq!(updated["name"], "张三");

    // Renaming onto a taken id
    app.create_student(&token, "S002", "王五", "一班").await;
    let collision = app
        .client
        .put(app.url("/api/students/S002"))
        .bearer_auth(&token)
        .json(&json!({"student_id": "S001"}))
        .send()
        .await
        .unwrap();
    assert_eq!(collision.status().as_u16(), 400);

    // Delete
    let deleted = app
        .client
        .delete(app.url("/api/students/S001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);

    let again = app
        .client
        .delete(app.url("/api/students/S001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 404);
}

#[tokio::test]
async fn student_list_filters_and_sorts() {
    let app = spawn_app().await;
    let token = app.token().await;

    app.create_student(&token, "S3", "丙", "一班").await;
    app.create_student(&token, "S1", "甲", "二班").await;
    app.create_student(&token, "S2", "乙", "一班").await;

    let list: Vec<Value> = app
        .client
        .get(app.url("/api/students?class_name=一班&sort_by=student_id&sort_order=desc"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = list.iter().map(|s| s["student_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["S3", "S2"]);

    // Unknown sort keys fall back to name and never reach SQL.
    let list: Vec<Value> = app
        .client
        .get(app.url("/api/students?sort_by=drop_table&limit=2&skip=1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn batch_delete_and_query() {
    let app = spawn_app().await;
    let token = app.token().await;

    for id in ["B1", "B2", "B3"] {
        app.create_student(&token, id, id, "一班").await;
    }

    let queried: Value = app
        .client
        .post(app.url("/api/students/batch-query"))
        .bearer_auth(&token)
        .json(&json!({"student_ids": ["B3", "B1", "NOPE"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(queried["total_count"], 2);
    assert_eq!(queried["students"][0]["student_id"], "B3");

    let deleted: Value = app
        .client
        .post(app.url("/api/students/batch-delete"))
        .bearer_auth(&token)
        .json(&json!({"student_ids": ["B1", "B2", "NOPE"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted_count"], 2);
    assert_eq!(app.count("students").await, 1);
}

#[tokio::test]
async fn public_validate_reflects_writes() {
    let app = spawn_app().await;
    let token = app.token().await;

    let unknown: Value = app
        .client
        .post(app.url("/api/students/validate"))
        .json(&json!({"student_id": "V1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(unknown.is_null());

    app.create_student(&token, "V1", "小明", "一班").await;

    let found: Value = app
        .client
        .post(app.url("/api/students/validate"))
        .json(&json!({"student_id": "V1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["name"], "小明");

    // The cached entry must not survive an update.
    app.client
        .put(app.url("/api/students/V1"))
        .bearer_auth(&token)
        .json(&json!({"name": "小明明"}))
        .send()
        .await
        .unwrap();

    let refreshed: Value = app
        .client
        .post(app.url("/api/students/validate"))
        .json(&json!({"student_id": "V1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refreshed["name"], "小明明");
}

fn roster(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

#[tokio::test]
async fn batch_import_reports_rows() {
    let app = spawn_app().await;
    let token = app.token().await;
    app.create_student(&token, "EXIST", "老生", "一班").await;

    let bytes = roster(&[
        &["name", "student_id", "class_name", "gender"],
        &["甲", "N1", "一班", "男"],
        &["乙", "N2", "", "女"],
        &["丙", "EXIST", "二班", "女"],
        &["丁", "N3", "二班", "男"],
        &["戊", "N1", "三班", "女"],
    ]);
    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(bytes).file_name("students.xlsx"),
    );

    let response = app
        .client
        .post(app.url("/api/students/batch-import"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["success_count"], 2);
    assert_eq!(summary["duplicate_count"], 2);
    assert_eq!(summary["error_count"], 1);
    assert_eq!(summary["error_rows"][0]["row"], 3);
    assert_eq!(summary["duplicate_students"][0]["student_id"], "EXIST");
    assert_eq!(summary["duplicate_students"][1]["row"], 6);
    assert_eq!(summary["detail"], "导入完成：成功 2 条学生，重复 2 条，错误 1 条");
    assert_eq!(app.count("students").await, 3);
}

#[tokio::test]
async fn batch_import_rejects_bad_files() {
    let app = spawn_app().await;
    let token = app.token().await;

    let missing_cols = roster(&[&["name", "student_id"], &["甲", "N1"]]);
    let not_excel = b"plain text".to_vec();

    for bytes in [missing_cols, not_excel] {
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name("students.xlsx"),
        );
        let response = app
            .client
            .post(app.url("/api/students/batch-import"))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }
    assert_eq!(app.count("students").await, 0);
}
