use std::net::TcpListener;
use std::sync::Arc;

use gamgyul::auth::{TokenKind, TokenService};
use gamgyul::core::db::{JsonFileStore, UserStore};
use gamgyul::models::models::User;
use gamgyul::state::AppState;
use serde_json::json;
use tempfile::TempDir;

const ACCESS_SECRET: &str = "integration-access-secret";
const REFRESH_SECRET: &str = "integration-refresh-secret";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    store: Arc<JsonFileStore>,
    tokens: TokenService,
    dir: TempDir,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Arc::new(JsonFileStore::open(dir.path().join("db.json")).expect("Failed to open store"));
    let state = AppState::new(store.clone(), TokenService::new(ACCESS_SECRET, REFRESH_SECRET));

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = gamgyul::run(listener, state).expect("Failed to build server");
    tokio::spawn(server);

    TestApp {
        base_url: format!("http://127.0.0.1:{}/api", port),
        client: reqwest::Client::new(),
        store,
        tokens: TokenService::new(ACCESS_SECRET, REFRESH_SECRET),
        dir,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn signup(&self, accountname: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/user"))
            .json(&json!({
                "user": {
                    "username": accountname,
                    "email": email,
                    "password": password,
                    "accountname": accountname,
                }
            }))
            .send()
            .await
            .expect("Failed to sign up")
    }

    /// Inserts a user straight into the store, skipping password hashing.
    fn seed_user(&self, accountname: &str) -> User {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: accountname.to_string(),
            email: format!("{}@example.com", accountname),
            accountname: accountname.to_string(),
            intro: String::new(),
            image: String::new(),
            password: "not-a-hash".to_string(),
            following: Vec::new(),
            follower: Vec::new(),
        };
        self.store.insert(user.clone()).unwrap();
        user
    }

    fn token_for(&self, user: &User) -> String {
        self.tokens.issue(user, TokenKind::Access).unwrap()
    }

    fn reload(&self, user: &User) -> User {
        self.store.find_by_id(&user.id).unwrap().unwrap()
    }

    async fn follow(&self, token: &str, accountname: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/profile/{}/follow", accountname)))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .expect("Failed to follow")
    }
}

#[tokio::test]
async fn test_signup_then_signin_flow() {
    let app = spawn_app().await;

    let resp = app.signup("flow.user", "flow@example.com", "secret1").await;
    assert_eq!(resp.status(), 201);

    let login_resp = app
        .client
        .post(app.url("/user/signin"))
        .json(&json!({"user": {"email": "flow@example.com", "password": "secret1"}}))
        .send()
        .await
        .expect("Failed to sign in");

    assert_eq!(login_resp.status(), 200);
    let body = login_resp.json::<serde_json::Value>().await.unwrap();
    let access = body["user"]["accessToken"].as_str().expect("accessToken missing");
    let refresh = body["user"]["refreshToken"].as_str().expect("refreshToken missing");
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);
    assert_eq!(body["user"]["accountname"], "flow.user");
    assert!(body["user"].get("password").is_none());

    // The access token works on an authenticated endpoint.
    let me = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", format!("Bearer {}", access))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
    let me = me.json::<serde_json::Value>().await.unwrap();
    assert_eq!(me["user"]["accountname"], "flow.user");
    assert_eq!(me["user"]["isfollow"], false);
    assert!(me["user"].get("intro").is_none());

    // The refresh token does not.
    let me = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", format!("Bearer {}", refresh))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 401);
}

#[tokio::test]
async fn test_signup_response_shape() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/user"))
        .json(&json!({"user": {"username": "a", "email": "a@x.com", "password": "abcdef", "accountname": "a.b"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["user"]["accountname"], "a.b");
    assert_eq!(body["user"]["intro"], "");
    assert!(body["user"]["_id"].is_string());
    assert!(body["user"].get("password").is_none());

    // Stored hashed, not in plaintext.
    let stored = app.store.find_by_email("a@x.com").unwrap().unwrap();
    assert_ne!(stored.password, "abcdef");
}

#[tokio::test]
async fn test_signup_validation() {
    let app = spawn_app().await;

    let cases = [
        json!({}),
        json!({"user": {"username": "a", "email": "a@x.com", "password": "abcdef"}}),
        json!({"user": {"username": "a", "email": "a@x.com", "password": "abc", "accountname": "a"}}),
        json!({"user": {"username": "a", "email": "abc", "password": "abcdef", "accountname": "a"}}),
        json!({"user": {"username": "a", "email": "a@x.com", "password": "abcdef", "accountname": "a b"}}),
    ];
    for case in cases {
        let resp = app.client.post(app.url("/user")).json(&case).send().await.unwrap();
        assert_eq!(resp.status(), 400, "expected 400 for {}", case);
    }
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_signup_duplicates_rejected() {
    let app = spawn_app().await;

    assert_eq!(app.signup("first", "dup@example.com", "abcdef").await.status(), 201);
    let before = app.store.count().unwrap();

    let resp = app.signup("second", "dup@example.com", "abcdef").await;
    assert_eq!(resp.status(), 400);
    let resp = app.signup("first", "other@example.com", "abcdef").await;
    assert_eq!(resp.status(), 400);

    assert_eq!(app.store.count().unwrap(), before);
}

#[tokio::test]
async fn test_signin_failures() {
    let app = spawn_app().await;
    app.signup("known", "known@example.com", "abcdef").await;

    let resp = app
        .client
        .post(app.url("/user/signin"))
        .json(&json!({"user": {"email": "known@example.com", "password": "wrongpass"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], 422);

    let resp = app
        .client
        .post(app.url("/user/signin"))
        .json(&json!({"user": {"email": "nobody@example.com", "password": "abcdef"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    for case in [json!({}), json!({"user": {"email": "known@example.com"}}), json!({"user": {"password": "abcdef"}})] {
        let resp = app.client.post(app.url("/user/signin")).json(&case).send().await.unwrap();
        assert_eq!(resp.status(), 400, "expected 400 for {}", case);
    }
}

#[tokio::test]
async fn test_myinfo_auth() {
    let app = spawn_app().await;
    let user = app.seed_user("me");

    let resp = app.client.get(app.url("/user/myinfo")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", "Bearer not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let expired = app
        .tokens
        .issue_at(&user, TokenKind::Access, chrono::Utc::now().timestamp() - 7200)
        .unwrap();
    let resp = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", format!("Bearer {}", expired))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Valid signature, but nobody with that id exists.
    let mut stranger = user.clone();
    stranger.id = "no-such-user".to_string();
    let resp = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", format!("Bearer {}", app.token_for(&stranger)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .client
        .get(app.url("/user/myinfo"))
        .header("Authorization", format!("Bearer {}", app.token_for(&user)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_update_profile() {
    let app = spawn_app().await;
    let user = app.seed_user("before");
    app.seed_user("taken");
    let token = app.token_for(&user);

    let put = |body: serde_json::Value| {
        app.client
            .put(app.url("/user"))
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
    };

    let resp = put(json!({"user": {"accountname": "taken"}})).await.unwrap();
    assert_eq!(resp.status(), 400);
    let resp = put(json!({"user": {"accountname": "bad name"}})).await.unwrap();
    assert_eq!(resp.status(), 400);
    let resp = put(json!({"nothing": true})).await.unwrap();
    assert_eq!(resp.status(), 400);

    // Keeping the same accountname is not a conflict.
    let resp = put(json!({"user": {"accountname": "before"}})).await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = put(json!({"user": {"accountname": "after", "intro": "<b>hello</b>"}}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["user"]["accountname"], "after");
    assert_eq!(body["user"]["intro"], "hello");
    assert_eq!(body["user"]["username"], "before");
    assert_eq!(body["user"]["followerCount"], 0);
    assert!(body["user"].get("isfollow").is_none());

    let stored = app.reload(&user);
    assert_eq!(stored.accountname, "after");
    assert_eq!(stored.email, user.email);

    // Plain text survives being read back and sent again unchanged.
    for intro in ["Tom & Jerry", "1 < 2"] {
        let resp = put(json!({"user": {"intro": intro}})).await.unwrap();
        let body = resp.json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["user"]["intro"], intro);

        let echoed = body["user"]["intro"].clone();
        let resp = put(json!({"user": {"intro": echoed}})).await.unwrap();
        let body = resp.json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["user"]["intro"], intro);
        assert_eq!(app.reload(&user).intro, intro);
    }

    let resp = app
        .client
        .put(app.url("/user"))
        .json(&json!({"user": {"username": "x"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_availability_checks() {
    let app = spawn_app().await;
    app.seed_user("exists");

    let check = |path: &'static str, body: serde_json::Value| {
        app.client.post(app.url(path)).json(&body).send()
    };

    let resp = check("/user/emailvalid", json!({"user": {"email": "exists@example.com"}})).await.unwrap();
    assert_eq!(resp.status(), 200);
    let taken = resp.json::<serde_json::Value>().await.unwrap();

    let resp = check("/user/emailvalid", json!({"user": {"email": "free@example.com"}})).await.unwrap();
    assert_eq!(resp.status(), 200);
    let free = resp.json::<serde_json::Value>().await.unwrap();
    assert_ne!(taken["message"], free["message"]);

    let resp = check("/user/emailvalid", json!({"user": {"email": "abc"}})).await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = check("/user/accountnamevalid", json!({"user": {"accountname": "exists"}})).await.unwrap();
    assert_eq!(resp.status(), 200);
    let taken = resp.json::<serde_json::Value>().await.unwrap();

    let resp = check("/user/accountnamevalid", json!({"user": {"accountname": "free_one"}})).await.unwrap();
    assert_eq!(resp.status(), 200);
    let free = resp.json::<serde_json::Value>().await.unwrap();
    assert_ne!(taken["message"], free["message"]);

    let resp = check("/user/accountnamevalid", json!({"user": {}})).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_follow_is_idempotent() {
    let app = spawn_app().await;
    let me = app.seed_user("fan");
    let star = app.seed_user("star");
    let token = app.token_for(&me);

    let resp = app.follow(&token, "star").await;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["isfollow"], true);
    assert_eq!(body["profile"]["followerCount"], 1);

    let resp = app.follow(&token, "star").await;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["followerCount"], 1);
    assert_eq!(body["profile"]["isfollow"], true);

    assert_eq!(app.reload(&star).follower, vec![me.id.clone()]);
    assert_eq!(app.reload(&me).following, vec![star.id.clone()]);
}

#[tokio::test]
async fn test_follow_errors() {
    let app = spawn_app().await;
    let me = app.seed_user("solo");
    let token = app.token_for(&me);

    assert_eq!(app.follow(&token, "solo").await.status(), 400);
    assert_eq!(app.follow(&token, "ghost").await.status(), 404);

    let resp = app
        .client
        .post(app.url("/profile/solo/follow"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(app.reload(&me).following.is_empty());
}

#[tokio::test]
async fn test_unfollow() {
    let app = spawn_app().await;
    let me = app.seed_user("leaver");
    let other = app.seed_user("other");
    let token = app.token_for(&me);

    let unfollow = || {
        app.client
            .delete(app.url("/profile/other/unfollow"))
            .header("Authorization", format!("Bearer {}", token))
            .send()
    };

    // Never followed: still a success, nothing changes.
    let resp = unfollow().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["followerCount"], 0);
    assert_eq!(body["profile"]["isfollow"], false);

    app.follow(&token, "other").await;
    let resp = unfollow().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["followerCount"], 0);
    assert!(app.reload(&me).following.is_empty());
    assert!(app.reload(&other).follower.is_empty());

    let resp = app
        .client
        .delete(app.url("/profile/ghost/unfollow"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_profile_isfollow_depends_on_viewer() {
    let app = spawn_app().await;
    let viewer = app.seed_user("viewer");
    app.seed_user("target");
    let token = app.token_for(&viewer);
    app.follow(&token, "target").await;

    let resp = app.client.get(app.url("/profile/target")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["isfollow"], false);
    assert_eq!(
        body["profile"]["followerCount"].as_u64().unwrap() as usize,
        body["profile"]["follower"].as_array().unwrap().len()
    );

    let resp = app
        .client
        .get(app.url("/profile/target"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["profile"]["isfollow"], true);

    // A bad token on an optional-auth endpoint is just anonymous.
    let resp = app
        .client
        .get(app.url("/profile/target"))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app.client.get(app.url("/profile/ghost")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_following_pagination() {
    let app = spawn_app().await;
    let hub = app.seed_user("hub");
    let token = app.token_for(&hub);

    let mut names = Vec::new();
    for i in 0..15 {
        let name = format!("member_{:02}", i);
        app.seed_user(&name);
        assert_eq!(app.follow(&token, &name).await.status(), 200);
        names.push(name);
    }

    let resp = app
        .client
        .get(app.url("/profile/hub/following?skip=0&limit=10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let page = resp.json::<Vec<serde_json::Value>>().await.unwrap();
    let got: Vec<&str> = page.iter().map(|p| p["accountname"].as_str().unwrap()).collect();
    let expected: Vec<&str> = names[..10].iter().map(String::as_str).collect();
    assert_eq!(got, expected);

    let resp = app
        .client
        .get(app.url("/profile/hub/following?skip=10&limit=abc"))
        .send()
        .await
        .unwrap();
    let page = resp.json::<Vec<serde_json::Value>>().await.unwrap();
    assert_eq!(page.len(), 5);

    let resp = app
        .client
        .get(app.url("/profile/member_00/follower"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    let page = resp.json::<Vec<serde_json::Value>>().await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["accountname"], "hub");
    assert_eq!(page[0]["isfollow"], false);
    assert_eq!(page[0]["followingCount"], 15);

    let resp = app
        .client
        .get(app.url("/profile/member_00/following"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Vec<serde_json::Value>>().await.unwrap().len(), 0);

    let resp = app.client.get(app.url("/profile/ghost/follower")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_unknown_route_and_bad_body() {
    let app = spawn_app().await;

    let resp = app.client.get(app.url("/nowhere")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .client
        .post(app.url("/user"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = spawn_app().await;

    let resp = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/user/signin"))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type,authorization")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let resp = app
        .client
        .get(app.url("/profile/ghost"))
        .header("Origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_store_failure_is_generic_500() {
    let app = spawn_app().await;

    // A directory where the temp file should go makes every write fail.
    std::fs::create_dir(app.dir.path().join("db.json.tmp")).unwrap();

    let resp = app.signup("doomed", "doomed@example.com", "abcdef").await;
    assert_eq!(resp.status(), 500);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body, json!({"message": "Internal server error"}));

    assert_eq!(app.store.count().unwrap(), 0);
}
