//! The post listing and the static pages
use askama::Template;
use gotham::state::State;

use super::{DocumentResult, Nav, TemplateExt};
use crate::{
    db::DbConnection,
    post::{self, Post},
    user::User,
};

/// A post as shown in the listing
pub struct PostEntry {
    pub id: i32,
    pub title: String,
    pub subtitle: String,
    pub date: String,
    pub author: String,
}

impl From<(Post, User)> for PostEntry {
    fn from((post, author): (Post, User)) -> Self {
        PostEntry {
            id: post.id,
            title: post.title,
            subtitle: post.subtitle,
            date: post.date,
            author: author.name,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct Index {
    nav: Nav,
    posts: Vec<PostEntry>,
}

pub fn handler(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;

    let posts = post::list(connection)?
        .into_iter()
        .map(PostEntry::from)
        .collect();

    let template = Index {
        nav: Nav::from_state(state),
        posts,
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    nav: Nav,
}

pub fn about(state: &State) -> DocumentResult {
    let template = AboutTemplate {
        nav: Nav::from_state(state),
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    nav: Nav,
}

pub fn contact(state: &State) -> DocumentResult {
    let template = ContactTemplate {
        nav: Nav::from_state(state),
    };
    Ok(template.to_response(state))
}
