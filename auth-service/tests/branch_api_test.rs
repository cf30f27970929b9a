mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn active_branches_are_public() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(format!("{}/api/branches", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let branches: Vec<Value> = response.json().await.unwrap();
    let mut codes: Vec<&str> = branches.iter().filter_map(|b| b["code"].as_str()).collect();
    codes.sort();
    assert_eq!(codes, vec!["HCM", "HN"]);
    assert!(branches.iter().all(|b| b["isActive"] == true));
}

#[tokio::test]
async fn validate_email_answers_true_or_false() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let allowed: bool = client
        .get(format!("{}/api/branches/validate-email", app.address))
        .query(&[("email", "Student1@FE.edu.vn"), ("branchCode", "HCM")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(allowed);

    let wrong_branch: bool = client
        .get(format!("{}/api/branches/validate-email", app.address))
        .query(&[("email", "student1@fe.edu.vn"), ("branchCode", "HN")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!wrong_branch);

    let unknown_branch: bool = client
        .get(format!("{}/api/branches/validate-email", app.address))
        .query(&[("email", "student1@fe.edu.vn"), ("branchCode", "DN")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!unknown_branch);
}

#[tokio::test]
async fn create_branch_requires_a_token() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(format!("{}/api/branches", app.address))
        .json(&json!({ "name": "Da Nang Campus", "code": "DN", "address": "Da Nang" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn create_branch_without_permission_is_forbidden_and_has_no_effect() {
    let app = TestApp::spawn().await;
    let token = app.token_for("student1@fe.edu.vn", "HCM");

    let response = app
        .client()
        .post(format!("{}/api/branches", app.address))
        .bearer_auth(token)
        .json(&json!({ "name": "Da Nang Campus", "code": "DN", "address": "Da Nang" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert!(app.state.branches.find_by_code("DN").await.unwrap().is_none());
    assert!(app.activity.events().is_empty());
}

#[tokio::test]
async fn admin_creates_branch_and_manages_allow_list() {
    let app = TestApp::spawn().await;
    let client = app.client();
    let token = app.admin_token();

    let response = client
        .post(format!("{}/api/branches", app.address))
        .bearer_auth(&token)
        .json(&json!({ "name": "Da Nang Campus", "code": "DN", "address": "Da Nang" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["code"], "DN");
    assert_eq!(created["isActive"], true);
    let branch_id = created["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/api/branches/{}/allowed-emails", app.address, branch_id))
        .bearer_auth(&token)
        .json(&json!({ "email": "Student.DN@fe.edu.vn", "description": "pilot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let entry: Value = response.json().await.unwrap();
    assert_eq!(entry["email"], "student.dn@fe.edu.vn");

    assert!(
        app.state
            .email_authorization
            .validate_email_for_branch("student.dn@fe.edu.vn", "DN")
            .await
    );

    let emails: Vec<String> = client
        .get(format!("{}/api/branches/{}/allowed-emails", app.address, branch_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(emails, vec!["student.dn@fe.edu.vn".to_string()]);

    let response = client
        .delete(format!("{}/api/branches/{}/allowed-emails", app.address, branch_id))
        .bearer_auth(&token)
        .query(&[("email", "student.dn@fe.edu.vn")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        !app.state
            .email_authorization
            .validate_email_for_branch("student.dn@fe.edu.vn", "DN")
            .await
    );

    let actions = app.activity.events();
    assert_eq!(actions.len(), 3);
    assert!(actions
        .iter()
        .all(|e| e.actor.as_deref() == Some(common::ADMIN_EMAIL)));
    assert!(actions[0].detail.starts_with("Created branch DN"));
}

#[tokio::test]
async fn duplicate_branch_code_is_a_conflict() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(format!("{}/api/branches", app.address))
        .bearer_auth(app.admin_token())
        .json(&json!({ "name": "Second HCM", "code": "HCM", "address": "Somewhere" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn blank_branch_fields_fail_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(format!("{}/api/branches", app.address))
        .bearer_auth(app.admin_token())
        .json(&json!({ "name": "", "code": "DN", "address": "Da Nang" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn branch_code_longer_than_ten_characters_fails_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(format!("{}/api/branches", app.address))
        .bearer_auth(app.admin_token())
        .json(&json!({ "name": "Long Code Campus", "code": "CAMPUS_LONG", "address": "Can Tho" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    assert!(app.state.branches.find_by_code("CAMPUS_LONG").await.unwrap().is_none());
    assert!(app.activity.events().is_empty());
}

#[tokio::test]
async fn allowed_email_history_includes_removed_entries() {
    let app = TestApp::spawn().await;
    let client = app.client();
    let token = app.admin_token();
    let hn = app.branch_id("HN").await;

    let response = client
        .delete(format!("{}/api/branches/{}/allowed-emails", app.address, hn))
        .bearer_auth(&token)
        .query(&[("email", "student.hn@fe.edu.vn")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let active: Vec<String> = client
        .get(format!("{}/api/branches/{}/allowed-emails", app.address, hn))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!active.contains(&"student.hn@fe.edu.vn".to_string()));

    let response = client
        .get(format!("{}/api/branches/{}/allowed-emails/history", app.address, hn))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let history: Vec<Value> = response.json().await.unwrap();
    assert_eq!(history.len(), active.len() + 1);

    let removed = history
        .iter()
        .find(|e| e["email"] == "student.hn@fe.edu.vn")
        .expect("removed entry is kept in history");
    assert_eq!(removed["isActive"], false);
    assert_eq!(removed["branchId"], hn.to_string());
}

#[tokio::test]
async fn allowed_email_history_requires_branch_read() {
    let app = TestApp::spawn().await;
    let hn = app.branch_id("HN").await;

    let response = app
        .client()
        .get(format!("{}/api/branches/{}/allowed-emails/history", app.address, hn))
        .bearer_auth(app.token_for("student.hn@fe.edu.vn", "HN"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn deactivated_branch_rejects_its_emails() {
    let app = TestApp::spawn().await;
    let hn = app.branch_id("HN").await;

    let response = app
        .client()
        .delete(format!("{}/api/branches/{}", app.address, hn))
        .bearer_auth(app.admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert!(
        !app.state
            .email_authorization
            .validate_email_for_branch("student.hn@fe.edu.vn", "HN")
            .await
    );

    let branches: Vec<Value> = app
        .client()
        .get(format!("{}/api/branches", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0]["code"], "HCM");
}

#[tokio::test]
async fn teacher_can_read_but_not_update_branches() {
    let app = TestApp::spawn().await;
    let teacher = app
        .state
        .permissions
        .list_roles()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "TEACHER")
        .unwrap();
    app.state
        .permissions
        .assign_role("teacher1@fe.edu.vn", teacher.role_id)
        .await
        .unwrap();
    let token = app.token_for("teacher1@fe.edu.vn", "HCM");
    let hcm = app.branch_id("HCM").await;

    let response = app
        .client()
        .get(format!("{}/api/branches/{}", app.address, hcm))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .client()
        .put(format!("{}/api/branches/{}", app.address, hcm))
        .bearer_auth(&token)
        .json(&json!({ "name": "Renamed", "address": "Elsewhere" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
