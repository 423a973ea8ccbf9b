//! Templates and request handlers for viewing, commenting on and managing posts
use askama::Template;
use gotham::{
    router::response::extender::StaticResponseExtender,
    state::{FromState, State},
};
use gotham_derive::StateData;
use http::StatusCode;
use hyper::{Body, Response};

use super::{see_other, DocumentResult, Nav, TemplateExt};
use crate::{
    comment::{self, NewComment},
    db::{Connection, DbConnection},
    form::{CommentForm, CreatePostForm, FormErrors, Validate},
    handler::{require_admin, HttpError},
    post::{self, NewPost, Post, PostChanges},
    user::{self, User},
};

/// Shown on the login page when an anonymous visitor tries to comment.
const LOGIN_TO_COMMENT: &str = "You need to login to add a comment";
const TITLE_TAKEN: &str = "A post with this title already exists.";

#[derive(Deserialize, StateData)]
pub struct PostPath {
    pub id: i32,
}

/// An id that isn't a number can't name a post.
impl StaticResponseExtender for PostPath {
    type ResBody = Body;

    fn extend(_state: &mut State, res: &mut Response<Body>) {
        *res.status_mut() = StatusCode::NOT_FOUND;
    }
}

/// A comment as shown below a post
pub struct CommentView {
    pub author: String,
    pub avatar: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostTemplate<'a> {
    nav: Nav,
    post: &'a Post,
    author: &'a str,
    body: String,
    comments: Vec<CommentView>,
    form: &'a CommentForm,
    errors: &'a FormErrors,
}

#[derive(Template)]
#[template(path = "make-post.html")]
struct MakePostTemplate<'a> {
    nav: Nav,
    form: &'a CreatePostForm,
    errors: &'a FormErrors,
    is_edit: bool,
    action: String,
}

fn render_post(
    state: &State,
    connection: &Connection,
    post: &Post,
    form: &CommentForm,
    errors: &FormErrors,
) -> DocumentResult {
    let author = user::get(connection, post.author_id)?;
    let comments = comment::list(connection, post.id)?
        .into_iter()
        .map(|(comment, author)| CommentView {
            html: comment.formatted(),
            avatar: author.avatar(),
            author: author.name,
        })
        .collect();
    let template = PostTemplate {
        nav: Nav::from_state(state),
        post,
        author: &author.name,
        body: post.formatted(),
        comments,
        form,
        errors,
    };
    Ok(template.to_response(state))
}

/// Display a post with its comments
pub fn view(state: &State) -> DocumentResult {
    let id = PostPath::borrow_from(state).id;
    let connection = &DbConnection::from_state(state)?;

    let post = post::view(connection, id)?;
    render_post(
        state,
        connection,
        &post,
        &CommentForm::default(),
        &FormErrors::new(),
    )
}

/// Comment submission. Anonymous visitors are sent to the login page.
pub fn comment_post(state: &State, body: Vec<u8>) -> DocumentResult {
    let id = PostPath::borrow_from(state).id;
    let form: CommentForm = serde_urlencoded::from_bytes(&body)?;
    let connection = &DbConnection::from_state(state)?;

    let post = post::view(connection, id)?;
    let errors = form.validate();
    if !errors.is_empty() {
        return render_post(state, connection, &post, &form, &errors);
    }

    let author = match User::try_borrow_from(state) {
        Some(user) => user,
        None => {
            let query = serde_urlencoded::to_string(&[("error", LOGIN_TO_COMMENT)])?;
            return Ok(see_other(state, format!("/login?{}", query)));
        }
    };

    let new = NewComment {
        text: &form.body,
        author_id: author.id,
        post_id: post.id,
    };
    comment::submit(connection, &new)?;
    tracing::info!("User {} commented on post {}", author.id, post.id);

    Ok(see_other(state, format!("/post/{}", post.id)))
}

fn render_form(
    state: &State,
    form: &CreatePostForm,
    errors: &FormErrors,
    edit: Option<i32>,
) -> DocumentResult {
    let action = match edit {
        Some(id) => format!("/edit/{}", id),
        None => String::from("/add"),
    };
    let template = MakePostTemplate {
        nav: Nav::from_state(state),
        form,
        errors,
        is_edit: edit.is_some(),
        action,
    };
    Ok(template.to_response(state))
}

/// Validates a submitted post form, including the title being free.
fn check_form(
    connection: &Connection,
    form: &CreatePostForm,
    edit: Option<i32>,
) -> Result<FormErrors, failure::Error> {
    let mut errors = form.validate();
    if errors.message("title").is_empty() && post::title_taken(connection, &form.title, edit)? {
        errors.push("title", TITLE_TAKEN);
    }
    Ok(errors)
}

/// Form for a new post
pub fn add(state: &State) -> DocumentResult {
    require_admin(state)?;
    render_form(state, &CreatePostForm::default(), &FormErrors::new(), None)
}

pub fn add_post(state: &State, body: Vec<u8>) -> DocumentResult {
    let admin = require_admin(state)?;
    let form: CreatePostForm = serde_urlencoded::from_bytes(&body)?;
    let connection = &DbConnection::from_state(state)?;

    let errors = check_form(connection, &form, None)?;
    if !errors.is_empty() {
        return render_form(state, &form, &errors, None);
    }

    let new = NewPost {
        author_id: admin.id,
        title: &form.title,
        subtitle: &form.subtitle,
        date: post::today(),
        body: &form.body,
        img_url: form.img_url.trim(),
    };
    post::submit(connection, &new)?;
    tracing::info!("Created post '{}'", form.title);

    Ok(see_other(state, "/"))
}

/// Form for editing an existing post, filled with its current values
pub fn edit(state: &State) -> DocumentResult {
    require_admin(state)?;
    let id = PostPath::borrow_from(state).id;
    let connection = &DbConnection::from_state(state)?;

    let post = post::view(connection, id)?;
    render_form(
        state,
        &CreatePostForm::from(&post),
        &FormErrors::new(),
        Some(post.id),
    )
}

pub fn edit_post(state: &State, body: Vec<u8>) -> DocumentResult {
    require_admin(state)?;
    let id = PostPath::borrow_from(state).id;
    let form: CreatePostForm = serde_urlencoded::from_bytes(&body)?;
    let connection = &DbConnection::from_state(state)?;

    let post = post::view(connection, id)?;
    let errors = check_form(connection, &form, Some(post.id))?;
    if !errors.is_empty() {
        return render_form(state, &form, &errors, Some(post.id));
    }

    let changes = PostChanges {
        title: &form.title,
        subtitle: &form.subtitle,
        body: &form.body,
        img_url: form.img_url.trim(),
    };
    post::edit(connection, post.id, &changes)?;
    tracing::info!("Edited post {}", post.id);

    Ok(see_other(state, format!("/post/{}", post.id)))
}

/// Deletes a post and its comments without confirmation
pub fn delete(state: &State) -> DocumentResult {
    require_admin(state)?;
    let id = PostPath::borrow_from(state).id;
    let connection = &DbConnection::from_state(state)?;

    if post::delete(connection, id)? == 0 {
        return Err(HttpError::NotFound.into());
    }
    tracing::info!("Deleted post {}", id);

    Ok(see_other(state, "/"))
}
