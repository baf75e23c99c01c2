use serde::{Deserialize, Serialize};

use crate::types::{Post, Site};

// Form bodies. Every field is optional so that a missing field becomes a
// validation message rather than an extractor rejection.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subdirectory: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostForm {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub small_description: Option<String>,
    pub cover_image: Option<String>,
    pub article_content: Option<String>,
    pub site_id: Option<String>,
    pub article_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageForm {
    pub site_id: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSiteForm {
    pub site_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePostForm {
    pub article_id: Option<String>,
    pub site_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignUpForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub sites: Vec<Site>,
    pub articles: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct SiteDetailResponse {
    pub site: Site,
    pub posts: Vec<Post>,
}
