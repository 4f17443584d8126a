use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub accountname: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub image: String,
    /// Argon2 PHC string.
    pub password: String,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub follower: Vec<String>,
}

/// Fields to merge into a stored user; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub accountname: Option<String>,
    pub intro: Option<String>,
    pub image: Option<String>,
    pub following: Option<Vec<String>>,
    pub follower: Option<Vec<String>>,
}

impl UserPatch {
    pub fn following(ids: Vec<String>) -> Self {
        Self {
            following: Some(ids),
            ..Self::default()
        }
    }

    pub fn follower(ids: Vec<String>) -> Self {
        Self {
            follower: Some(ids),
            ..Self::default()
        }
    }

    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.accountname {
            user.accountname = v;
        }
        if let Some(v) = self.intro {
            user.intro = v;
        }
        if let Some(v) = self.image {
            user.image = v;
        }
        if let Some(v) = self.following {
            user.following = v;
        }
        if let Some(v) = self.follower {
            user.follower = v;
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccessClaims {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub accountname: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RefreshClaims {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Public account fields returned on signup.
#[derive(Serialize, Debug)]
pub struct UserView<'a> {
    #[serde(rename = "_id")]
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub accountname: &'a str,
    pub intro: &'a str,
    pub image: &'a str,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: &user.id,
            username: &user.username,
            email: &user.email,
            accountname: &user.accountname,
            intro: &user.intro,
            image: &user.image,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SigninView<'a> {
    #[serde(rename = "_id")]
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub accountname: &'a str,
    pub image: &'a str,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Profile shape shared by myinfo, profile update, profile lookup, follow
/// responses and the following/follower listings. Counts are always derived
/// from the sequences being returned.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProfileView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub accountname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isfollow: Option<bool>,
    pub following: Vec<String>,
    pub follower: Vec<String>,
    #[serde(rename = "followerCount")]
    pub follower_count: usize,
    #[serde(rename = "followingCount")]
    pub following_count: usize,
}

impl ProfileView {
    pub fn of(user: &User, isfollow: bool) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            accountname: user.accountname.clone(),
            intro: Some(user.intro.clone()),
            image: user.image.clone(),
            isfollow: Some(isfollow),
            following: user.following.clone(),
            follower: user.follower.clone(),
            follower_count: user.follower.len(),
            following_count: user.following.len(),
        }
    }

    pub fn without_intro(mut self) -> Self {
        self.intro = None;
        self
    }

    pub fn without_isfollow(mut self) -> Self {
        self.isfollow = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sequences_default_to_empty() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "1",
            "username": "a",
            "email": "a@x.com",
            "accountname": "a",
            "password": "h"
        }))
        .unwrap();
        assert!(user.following.is_empty());
        assert!(user.follower.is_empty());
        assert_eq!(user.intro, "");
    }

    #[test]
    fn profile_view_serializes_counts_and_skips_absent_fields() {
        let user = User {
            id: "1".into(),
            username: "a".into(),
            email: "a@x.com".into(),
            accountname: "a".into(),
            intro: "hi".into(),
            image: String::new(),
            password: "h".into(),
            following: vec!["2".into(), "3".into()],
            follower: vec!["2".into()],
        };
        let v = serde_json::to_value(ProfileView::of(&user, false).without_intro()).unwrap();
        assert_eq!(v["_id"], "1");
        assert_eq!(v["followingCount"], 2);
        assert_eq!(v["followerCount"], 1);
        assert_eq!(v["isfollow"], false);
        assert!(v.get("intro").is_none());
        assert!(v.get("password").is_none());
    }
}
