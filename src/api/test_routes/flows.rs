use crate::api::guards::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::db::types::UserRole;
use crate::test_support;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn teacher_creates_test_with_questions_and_edits_it() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let teacher = test_support::insert_user(ctx.state.db(), "teacher1", UserRole::Teacher).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/tests",
            Some(&token),
            Some(json!({
                "name": "Practice SHSAT",
                "pass_score": 70,
                "available_from": "2025-01-01T08:00",
                "questions": [
                    {
                        "order_index": 1,
                        "question_text": "2 + 2?",
                        "choices": {"A": "3", "B": "4", "C": "5", "D": "6"},
                        "correct_choice": "B"
                    }
                ]
            })),
        ))
        .await
        .expect("create test");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    assert_eq!(created["is_published"], true);
    assert_eq!(created["grading_mode"], "instant");
    assert_eq!(created["created_by"], teacher.id);
    assert_eq!(created["questions"][0]["correct_choice"], "B");
    let test_id = created["id"].as_str().expect("test id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/tests/{test_id}"),
            Some(&token),
            Some(json!({"name": "Renamed", "pass_score": null})),
        ))
        .await
        .expect("update test");

    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["name"], "Renamed");
    assert!(updated["pass_score"].is_null());
    assert_eq!(updated["available_from"], created["available_from"]);
}

#[tokio::test]
async fn invalid_correct_choice_is_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let teacher = test_support::insert_user(ctx.state.db(), "teacher1", UserRole::Teacher).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/tests",
            Some(&token),
            Some(json!({
                "name": "Broken",
                "questions": [
                    {
                        "question_text": "Pick one",
                        "choices": {"A": "x", "B": "y"},
                        "correct_choice": "E"
                    }
                ]
            })),
        ))
        .await
        .expect("create test");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let tests: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tests").fetch_one(ctx.state.db()).await.unwrap();
    assert_eq!(tests, 0);
}

#[tokio::test]
async fn duplicate_student_assignment_conflicts_and_keeps_one_row() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let student = test_support::insert_user(db, "student1", UserRole::Student).await;
    test_support::link_teacher_student(db, &teacher, &student).await;
    let (test, _) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());
    let uri = format!("/api/v1/tests/{}/assign-to-student/{}", test.id, student.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("first assign");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["started"], false);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("second assign");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_test_assignments WHERE student_id = $1 AND test_id = $2",
    )
    .bind(&student.id)
    .bind(&test.id)
    .fetch_one(db)
    .await
    .expect("count assignments");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn duplicate_classroom_assignment_conflicts() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let classroom = test_support::insert_classroom(db, "Period 1", &teacher, &[]).await;
    let (test, _) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());
    let uri = format!("/api/v1/tests/{}/assign-to-classroom/{}", test.id, classroom.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("first assign");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("second assign");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, &uri, Some(&token), None))
        .await
        .expect("unassign");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn teacher_cannot_assign_to_unlinked_student() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let student = test_support::insert_user(db, "student1", UserRole::Student).await;
    let (test, _) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{}/assign-to-student/{}", test.id, student.id),
            Some(&token),
            None,
        ))
        .await
        .expect("assign");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn teacher_cannot_edit_another_teachers_test() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let author = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let other = test_support::insert_user(db, "teacher2", UserRole::Teacher).await;
    let (test, _) =
        test_support::insert_test(db, &author, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&other, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{}", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unassigning_missing_assignment_is_not_found() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let admin = test_support::insert_user(db, "admin", UserRole::Admin).await;
    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let student = test_support::insert_user(db, "student1", UserRole::Student).await;
    let (test, _) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{}/assign-to-student/{}", test.id, student.id),
            Some(&token),
            None,
        ))
        .await
        .expect("unassign");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn header_identity_must_match_stored_role() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let teacher = test_support::insert_user(ctx.state.db(), "teacher1", UserRole::Teacher).await;

    let request = |role: &str| {
        Request::builder()
            .method(Method::GET)
            .uri("/api/v1/tests")
            .header(USER_ID_HEADER, teacher.id.as_str())
            .header(USER_ROLE_HEADER, role)
            .body(Body::empty())
            .unwrap()
    };

    let response = ctx.app.clone().oneshot(request("teacher")).await.expect("list as teacher");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.app.clone().oneshot(request("admin")).await.expect("list as admin");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_classroom_assignment_body_is_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let classroom = test_support::insert_classroom(db, "Period 1", &teacher, &[]).await;
    let (test, _) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A"]).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tests/{}/assign-to-classroom/{}", test.id, classroom.id),
            Some(&token),
            Some(json!({"is_visible": "no", "visible_from": "garbage"})),
        ))
        .await
        .expect("assign");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM classroom_test_assignments WHERE classroom_id = $1",
    )
    .bind(&classroom.id)
    .fetch_one(db)
    .await
    .expect("count assignments");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn answered_question_cannot_be_deleted_but_test_can() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let db = ctx.state.db();

    let teacher = test_support::insert_user(db, "teacher1", UserRole::Teacher).await;
    let student = test_support::insert_user(db, "student1", UserRole::Student).await;
    let (test, questions) =
        test_support::insert_test(db, &teacher, test_support::test_fields("Practice"), &["A", "B"])
            .await;
    test_support::assign_to_student(db, &test, &student, &teacher).await;
    let teacher_token = test_support::bearer_token(&teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/student/submit",
            Some(&student_token),
            Some(json!({
                "test_id": test.id,
                "answers": [{"question_id": questions[0].id, "selected_choice": "A"}]
            })),
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{}/questions/{}", test.id, questions[0].id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("delete answered question");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{}/questions/{}", test.id, questions[1].id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("delete unanswered question");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/tests/{}", test.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("delete test");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_answers")
        .fetch_one(db)
        .await
        .expect("count answers");
    assert_eq!(answers, 0);
}
