use gotham::{
    helpers::http::response::{create_response, create_temporary_redirect as temp_redirect},
    state::{FromState, State},
};
use http::StatusCode;
use hyper::{Body, Response};

use std::borrow::Cow;

use crate::user::User;

pub mod index;
pub mod post;
pub mod user;

pub type DocumentResult = Result<Response<Body>, failure::Error>;

pub trait TemplateExt {
    fn to_response(&self, state: &State) -> Response<Body>;
}

impl<T: askama::Template> TemplateExt for T {
    fn to_response(&self, state: &State) -> Response<Body> {
        match self.render() {
            Ok(string) => create_response(state, StatusCode::OK, mime::TEXT_HTML, string),
            Err(e) => create_response(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                mime::TEXT_PLAIN,
                format!("Template error: {}", e),
            ),
        }
    }
}

/// What the navigation bar needs to know about the visitor
#[derive(Clone, Copy, Debug, Default)]
pub struct Nav {
    pub logged_in: bool,
    pub is_admin: bool,
}

impl Nav {
    pub fn from_state(state: &State) -> Nav {
        match User::try_borrow_from(state) {
            Some(user) => Nav {
                logged_in: true,
                is_admin: user.is_admin(),
            },
            None => Nav::default(),
        }
    }
}

/// Redirect that makes the client follow up with a GET.
pub fn see_other<L: Into<Cow<'static, str>>>(state: &State, location: L) -> Response<Body> {
    let mut response = temp_redirect(state, location);
    *response.status_mut() = StatusCode::SEE_OTHER;
    response
}
