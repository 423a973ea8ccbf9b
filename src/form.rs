//! Forms submitted by the HTML pages and their validation rules.
//!
//! Every form deserializes from an urlencoded body with missing fields left empty, so a form
//! that's missing a field fails validation instead of failing to parse. Email addresses are
//! trimmed while parsing, so the address that's validated is the one that's looked up and stored.
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::post::Post;

/// A validation failure for a single form field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// The validation failures of a form
#[derive(Clone, Debug, Default)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn new() -> Self {
        FormErrors(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    /// The first message for `field`, or an empty string if it's valid.
    pub fn message(&self, field: &str) -> &str {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
            .unwrap_or("")
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|error| error.field).collect()
    }

    fn required(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, "This field is required.");
            false
        } else {
            true
        }
    }

    fn url(&mut self, field: &'static str, value: &str) {
        if !self.required(field, value) {
            return;
        }
        match Url::parse(value.trim()) {
            Ok(url) if (url.scheme() == "http" || url.scheme() == "https") && url.has_host() => {}
            _ => self.push(field, "Invalid URL."),
        }
    }

    fn email(&mut self, field: &'static str, value: &str) {
        if !self.required(field, value) {
            return;
        }
        if !is_email(value) {
            self.push(field, "Invalid email address.");
        }
    }
}

/// A form whose fields can be checked before use
pub trait Validate {
    fn validate(&self) -> FormErrors;
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_owned())
}

/// Checks the shape `local@domain.tld` without whitespace.
fn is_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let (local, domain) = match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => (local, domain),
        _ => return false,
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Creating or editing a post
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostForm {
    pub title: String,
    pub subtitle: String,
    pub img_url: String,
    pub body: String,
}

impl Validate for CreatePostForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        errors.required("title", &self.title);
        errors.required("subtitle", &self.subtitle);
        errors.url("img_url", &self.img_url);
        errors.required("body", &self.body);
        errors
    }
}

impl From<&Post> for CreatePostForm {
    fn from(post: &Post) -> Self {
        CreatePostForm {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            img_url: post.img_url.clone(),
            body: post.body.clone(),
        }
    }
}

/// Signing up for an account
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
    pub password: String,
    /// The password typed a second time
    pub confirm: String,
}

impl Validate for RegisterForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        errors.required("name", &self.name);
        errors.email("email", &self.email);
        errors.required("password", &self.password);
        if self.confirm != self.password {
            errors.push("confirm", "Passwords must match.");
        }
        errors
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
    pub password: String,
}

impl Validate for LoginForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        errors.email("email", &self.email);
        errors.required("password", &self.password);
        errors
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub body: String,
}

impl Validate for CommentForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        errors.required("body", &self.body);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form() -> CreatePostForm {
        CreatePostForm {
            title: String::from("Title"),
            subtitle: String::from("Subtitle"),
            img_url: String::from("https://example.com/image.jpg"),
            body: String::from("Body"),
        }
    }

    fn register_form() -> RegisterForm {
        RegisterForm {
            name: String::from("Someone"),
            email: String::from("someone@example.com"),
            password: String::from("secret"),
            confirm: String::from("secret"),
        }
    }

    #[test]
    fn valid_forms() {
        assert!(post_form().validate().is_empty());
        assert!(register_form().validate().is_empty());
        let login = LoginForm {
            email: String::from("someone@example.com"),
            password: String::from("secret"),
        };
        assert!(login.validate().is_empty());
        let comment = CommentForm {
            body: String::from("Hello"),
        };
        assert!(comment.validate().is_empty());
    }

    #[test]
    fn missing_fields_are_required() {
        let form: CreatePostForm = serde_urlencoded::from_str("title=Only+a+title").unwrap();
        let errors = form.validate();
        assert_eq!(errors.fields(), ["subtitle", "img_url", "body"]);
        assert_eq!(errors.message("body"), "This field is required.");
        assert_eq!(errors.message("title"), "");

        let comment: CommentForm = serde_urlencoded::from_str("body=+++").unwrap();
        assert_eq!(comment.validate().fields(), ["body"]);
    }

    #[test]
    fn image_must_be_a_web_url() {
        for bad in &["not a url", "ftp://example.com/a.png", "/relative/path.png", "https://"] {
            let form = CreatePostForm {
                img_url: String::from(*bad),
                ..post_form()
            };
            assert_eq!(form.validate().message("img_url"), "Invalid URL.", "{}", bad);
        }
    }

    #[test]
    fn email_shape() {
        for good in &["a@b.co", "first.last@sub.example.org"] {
            assert!(is_email(good), "{}", good);
        }
        for bad in &["plain", "@example.com", "a@", "a@b", "a@@b.com", "a b@c.com", "a@b..com"] {
            assert!(!is_email(bad), "{}", bad);
        }
        let form = RegisterForm {
            email: String::from("nope"),
            ..register_form()
        };
        assert_eq!(form.validate().message("email"), "Invalid email address.");
    }

    #[test]
    fn passwords_must_match() {
        let form = RegisterForm {
            confirm: String::from("different"),
            ..register_form()
        };
        assert_eq!(form.validate().fields(), ["confirm"]);
    }

    #[test]
    fn emails_are_trimmed_when_parsed() {
        let form: RegisterForm = serde_urlencoded::from_str(
            "name=Reader&email=+reader%40example.com%09&password=pw&confirm=pw",
        )
        .unwrap();
        assert_eq!(form.email, "reader@example.com");
        assert!(form.validate().is_empty());

        let form: LoginForm =
            serde_urlencoded::from_str("email=%20reader%40example.com%20&password=pw").unwrap();
        assert_eq!(form.email, "reader@example.com");
        assert_eq!(form.password, "pw");

        let form: LoginForm = serde_urlencoded::from_str("password=pw").unwrap();
        assert!(form.email.is_empty());
    }
}
