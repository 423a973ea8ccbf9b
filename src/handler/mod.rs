//! Glue between gotham and the page handlers: body collection, access guards and error responses.
use askama::Template;
use diesel::result::Error as DieselError;
use failure::Fail;
use futures::{future, Future, Stream};
use gotham::{
    handler::{HandlerFuture, IntoHandlerError},
    helpers::http::response::{create_empty_response, create_response},
    state::{FromState, State},
};
use http::{Response, StatusCode};
use hyper::Body;

use crate::{
    document::{Nav, TemplateExt},
    user::{Session, User},
};

/// Failures that are answered with a bare status code
#[derive(Debug, Fail)]
pub enum HttpError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Permission denied")]
    Forbidden,
    #[fail(display = "Login required")]
    Unauthorized,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::Forbidden => StatusCode::FORBIDDEN,
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    nav: Nav,
    error: String,
}

/// The logged in user, if they are the admin
pub fn require_admin(state: &State) -> Result<&User, failure::Error> {
    match User::try_borrow_from(state) {
        Some(user) if user.is_admin() => Ok(user),
        _ => Err(HttpError::Forbidden.into()),
    }
}

/// The current session, failing for anonymous requests
pub fn require_login(state: &State) -> Result<&Session, failure::Error> {
    Session::try_borrow_from(state).ok_or_else(|| HttpError::Unauthorized.into())
}

/// Creates a `HandlerFuture` that runs the given function
pub fn body_handler<F>(mut state: State, op: F) -> Box<HandlerFuture>
where
    F: FnOnce(&State, Vec<u8>) -> Response<Body> + Send + 'static,
{
    let f = Body::take_from(&mut state)
        .concat2()
        .then(|result| match result {
            Ok(body) => {
                let response = op(&state, body.to_vec());
                future::ok((state, response))
            }
            Err(e) => future::err((state, e.into_handler_error())),
        });

    Box::new(f)
}

/// Status code for errors that don't warrant an error page.
fn error_status(error: &failure::Error) -> Option<StatusCode> {
    if let Some(error) = error.downcast_ref::<HttpError>() {
        return Some(error.status());
    }
    match error.downcast_ref::<DieselError>() {
        Some(DieselError::NotFound) => Some(StatusCode::NOT_FOUND),
        _ => None,
    }
}

pub fn error_response(state: &State, error: impl std::fmt::Display) -> Response<Body> {
    let template = ErrorTemplate {
        nav: Nav::from_state(state),
        error: error.to_string(),
    };
    match template.render() {
        Ok(page) => create_response(
            state,
            StatusCode::INTERNAL_SERVER_ERROR,
            mime::TEXT_HTML,
            page,
        ),
        Err(_) => create_response(
            state,
            StatusCode::INTERNAL_SERVER_ERROR,
            mime::TEXT_PLAIN,
            template.error,
        ),
    }
}

pub fn response(state: &State, result: Result<Response<Body>, failure::Error>) -> Response<Body> {
    match result {
        Ok(response) => response,
        Err(error) => match error_status(&error) {
            Some(status) => {
                tracing::debug!("{}: {}", status, error);
                create_empty_response(state, status)
            }
            None => {
                tracing::error!("Request failed: {}", error);
                error_response(state, error)
            }
        },
    }
}

#[macro_export]
macro_rules! handler {
    ($handler_fn:path) => {
        |state| {
            let r = crate::handler::response(&state, $handler_fn(&state));
            (state, r)
        }
    };
}

#[macro_export]
macro_rules! body_handler {
    ($handler_fn:path) => {
        |state| {
            crate::handler::body_handler(state, |state, post| {
                crate::handler::response(&state, $handler_fn(state, post))
            })
        }
    };
}
