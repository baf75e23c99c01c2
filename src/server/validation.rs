//! Form validation.
//!
//! Each form is described by a set of [`FieldRule`]s. Parsing a form yields a
//! [`Submission`]: the typed value when every rule holds, or a
//! [`ValidationReport`] listing messages per field for re-display.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::server::dto::{ImageForm, PostForm, SignInForm, SignUpForm, SiteForm};

pub const REQUIRED: &str = "Required";
pub const SUBDIRECTORY_TAKEN: &str = "Subdirectory is already taken...";
pub const SLUG_TAKEN: &str = "Slug is already in use";
pub const EMAIL_TAKEN: &str = "Email is already registered";
pub const SITE_NOT_FOUND: &str = "Site not found";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Key for messages that belong to the whole form rather than one field.
pub const FORM_ERROR: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    LowercaseLetters,
    Email,
    Json,
}

impl Format {
    fn accepts(self, value: &str) -> bool {
        match self {
            Format::LowercaseLetters => value.chars().all(|c| c.is_ascii_lowercase()),
            Format::Email => is_email(value),
            Format::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        }
    }

    fn message(self) -> &'static str {
        match self {
            Format::LowercaseLetters => "Must only use lowercase letters",
            Format::Email => "Invalid email",
            Format::Json => "Must be valid JSON",
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Declarative rule for one required text field. Lengths count characters.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub min: usize,
    pub max: Option<usize>,
    pub format: Option<Format>,
}

impl FieldRule {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            min: 1,
            max: None,
            format: None,
        }
    }

    pub const fn text(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            min,
            max: Some(max),
            format: None,
        }
    }

    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    fn check(&self, value: &str) -> std::result::Result<(), String> {
        let len = value.chars().count();
        if len < self.min {
            return Err(format!(
                "String must contain at least {} character(s)",
                self.min
            ));
        }
        if let Some(max) = self.max {
            if len > max {
                return Err(format!("String must contain at most {max} character(s)"));
            }
        }
        if let Some(format) = self.format {
            if !format.accepts(value) {
                return Err(format.message().to_string());
            }
        }
        Ok(())
    }
}

pub const SITE_NAME: FieldRule = FieldRule::text("name", 1, 35);
pub const SITE_DESCRIPTION: FieldRule = FieldRule::text("description", 1, 150);
pub const SUBDIRECTORY: FieldRule =
    FieldRule::text("subdirectory", 1, 40).with_format(Format::LowercaseLetters);

pub const POST_TITLE: FieldRule = FieldRule::text("title", 1, 100);
pub const POST_SLUG: FieldRule = FieldRule::text("slug", 1, 190);
pub const COVER_IMAGE: FieldRule = FieldRule::required("coverImage");
pub const SMALL_DESCRIPTION: FieldRule = FieldRule::text("smallDescription", 1, 200);
pub const ARTICLE_CONTENT: FieldRule =
    FieldRule::required("articleContent").with_format(Format::Json);
pub const SITE_ID: FieldRule = FieldRule::required("siteId");
pub const ARTICLE_ID: FieldRule = FieldRule::required("articleId");
pub const IMAGE_URL: FieldRule = FieldRule::required("imageUrl");

pub const EMAIL: FieldRule = FieldRule::text("email", 3, 254).with_format(Format::Email);
pub const PASSWORD: FieldRule = FieldRule::text("password", 8, 128);
pub const USER_NAME: FieldRule = FieldRule::text("name", 1, 50);
pub const SIGN_IN_EMAIL: FieldRule = FieldRule::required("email");
pub const SIGN_IN_PASSWORD: FieldRule = FieldRule::required("password");

/// Field-level error messages, serialised as
/// `{"status":"error","error":{"field":["message"]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    status: &'static str,
    #[serde(rename = "error")]
    errors: BTreeMap<String, Vec<String>>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            status: "error",
            errors: BTreeMap::new(),
        }
    }
}

impl ValidationReport {
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.add(field, message);
        report
    }

    /// Report for a write rejected by a uniqueness constraint on `column`.
    #[must_use]
    pub fn conflict(column: &str) -> Self {
        match column {
            "subdirectory" => Self::single("subdirectory", SUBDIRECTORY_TAKEN),
            "slug" => Self::single("slug", SLUG_TAKEN),
            "email" => Self::single("email", EMAIL_TAKEN),
            other => Self::single(other, "Already exists"),
        }
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum Submission<T> {
    Success(T),
    Failure(ValidationReport),
}

impl<T> Submission<T> {
    pub fn into_result(self) -> std::result::Result<T, ValidationReport> {
        match self {
            Submission::Success(value) => Ok(value),
            Submission::Failure(report) => Err(report),
        }
    }
}

/// Collects field errors while a form is parsed.
#[derive(Debug, Default)]
struct FormValidator {
    report: ValidationReport,
}

impl FormValidator {
    /// Returns the value when it satisfies the rule, recording an error
    /// otherwise. Empty strings count as missing.
    fn field(&mut self, rule: &FieldRule, value: Option<&str>) -> Option<String> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            self.report.add(rule.name, REQUIRED);
            return None;
        };

        match rule.check(value) {
            Ok(()) => Some(value.to_string()),
            Err(message) => {
                self.report.add(rule.name, message);
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Submission<T> {
        match value {
            Some(value) if self.report.is_empty() => Submission::Success(value),
            _ => Submission::Failure(self.report),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteInput {
    pub name: String,
    pub description: String,
    pub subdirectory: String,
}

#[derive(Debug, Clone)]
pub struct PostInput {
    pub site_id: String,
    pub title: String,
    pub slug: String,
    pub small_description: String,
    pub cover_image: String,
    pub article_content: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PostEdit {
    pub article_id: String,
    pub post: PostInput,
}

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub site_id: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Parses the site creation form. The subdirectory is only checked for
/// uniqueness once it passes its own rules.
pub async fn parse_site_creation<F, Fut>(
    form: &SiteForm,
    is_subdirectory_unique: F,
) -> Result<Submission<SiteInput>>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut v = FormValidator::default();
    let name = v.field(&SITE_NAME, form.name.as_deref());
    let description = v.field(&SITE_DESCRIPTION, form.description.as_deref());
    let mut subdirectory = v.field(&SUBDIRECTORY, form.subdirectory.as_deref());

    if let Some(candidate) = subdirectory.clone() {
        if !is_subdirectory_unique(candidate).await? {
            v.report.add(SUBDIRECTORY.name, SUBDIRECTORY_TAKEN);
            subdirectory = None;
        }
    }

    let value = match (name, description, subdirectory) {
        (Some(name), Some(description), Some(subdirectory)) => Some(SiteInput {
            name,
            description,
            subdirectory,
        }),
        _ => None,
    };
    Ok(v.finish(value))
}

fn collect_post(v: &mut FormValidator, form: &PostForm) -> Option<PostInput> {
    let site_id = v.field(&SITE_ID, form.site_id.as_deref());
    let title = v.field(&POST_TITLE, form.title.as_deref());
    let slug = v.field(&POST_SLUG, form.slug.as_deref());
    let small_description = v.field(&SMALL_DESCRIPTION, form.small_description.as_deref());
    let cover_image = v.field(&COVER_IMAGE, form.cover_image.as_deref());
    let article_content = v
        .field(&ARTICLE_CONTENT, form.article_content.as_deref())
        .and_then(|text| serde_json::from_str(&text).ok());

    Some(PostInput {
        site_id: site_id?,
        title: title?,
        slug: slug?,
        small_description: small_description?,
        cover_image: cover_image?,
        article_content: article_content?,
    })
}

pub fn parse_post(form: &PostForm) -> Submission<PostInput> {
    let mut v = FormValidator::default();
    let post = collect_post(&mut v, form);
    v.finish(post)
}

pub fn parse_post_edit(form: &PostForm) -> Submission<PostEdit> {
    let mut v = FormValidator::default();
    let article_id = v.field(&ARTICLE_ID, form.article_id.as_deref());
    let post = collect_post(&mut v, form);
    let value = match (article_id, post) {
        (Some(article_id), Some(post)) => Some(PostEdit { article_id, post }),
        _ => None,
    };
    v.finish(value)
}

pub fn parse_image_update(form: &ImageForm) -> Submission<ImageInput> {
    let mut v = FormValidator::default();
    let site_id = v.field(&SITE_ID, form.site_id.as_deref());
    let image_url = v.field(&IMAGE_URL, form.image_url.as_deref());
    let value = match (site_id, image_url) {
        (Some(site_id), Some(image_url)) => Some(ImageInput { site_id, image_url }),
        _ => None,
    };
    v.finish(value)
}

pub fn parse_sign_up(form: &SignUpForm) -> Submission<SignUpInput> {
    let mut v = FormValidator::default();
    let email = form.email.as_deref().map(normalize_email);
    let email = v.field(&EMAIL, email.as_deref());
    let password = v.field(&PASSWORD, form.password.as_deref());
    let name = v.field(&USER_NAME, form.name.as_deref().map(str::trim));
    let value = match (email, password, name) {
        (Some(email), Some(password), Some(name)) => Some(SignUpInput {
            email,
            password,
            name,
        }),
        _ => None,
    };
    v.finish(value)
}

pub fn parse_sign_in(form: &SignInForm) -> Submission<SignInInput> {
    let mut v = FormValidator::default();
    let email = form.email.as_deref().map(normalize_email);
    let email = v.field(&SIGN_IN_EMAIL, email.as_deref());
    let password = v.field(&SIGN_IN_PASSWORD, form.password.as_deref());
    let value = match (email, password) {
        (Some(email), Some(password)) => Some(SignInInput { email, password }),
        _ => None,
    };
    v.finish(value)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
