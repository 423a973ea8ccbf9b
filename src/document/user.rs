//! Module for login, registration and logout

use askama::Template;
use cookie::{Cookie, SameSite};
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};
use http::header;
use hyper::{Body, Response};

use super::{see_other, DocumentResult, Nav, TemplateExt};
use crate::{
    config::Settings,
    db::DbConnection,
    form::{FormErrors, LoginForm, RegisterForm, Validate},
    handler::require_login,
    user::{self, LoginOutcome, NewUser, Session, SESSION_COOKIE},
};

const USER_EXISTS: &str = "User Exists";

/// Query string of the login page
#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct LoginQuery {
    /// Advisory message from the page that sent the visitor here
    pub error: Option<String>,
}

fn session_cookie<'a>(state: &State, id: &str) -> Cookie<'a> {
    let settings = Settings::borrow_from(state);
    let mut cookie = Cookie::build(SESSION_COOKIE, id.to_owned())
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .finish();
    if settings.cookie.secure {
        cookie.set_secure(true);
    }
    if let Some(ref domain) = settings.cookie.domain {
        cookie.set_domain(domain.to_owned());
    }
    cookie
}

/// Redirects home with the cookie for `session` set.
fn logged_in(state: &State, session: &Session) -> DocumentResult {
    let mut response = see_other(state, "/");
    let cookie = session_cookie(state, &session.id);
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse()?);
    Ok(response)
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    nav: Nav,
    form: &'a LoginForm,
    errors: &'a FormErrors,
    error: Option<&'a str>,
}

fn render_login(
    state: &State,
    form: &LoginForm,
    errors: &FormErrors,
    error: Option<&str>,
) -> Response<Body> {
    LoginTemplate {
        nav: Nav::from_state(state),
        form,
        errors,
        error,
    }
    .to_response(state)
}

/// Login form
pub fn login(state: &State) -> DocumentResult {
    let error = LoginQuery::try_borrow_from(state).and_then(|query| query.error.as_deref());
    Ok(render_login(
        state,
        &LoginForm::default(),
        &FormErrors::new(),
        error,
    ))
}

/// Login post. Sets session cookie if login was successful.
pub fn login_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let form: LoginForm = serde_urlencoded::from_bytes(&post)?;
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(render_login(state, &form, &errors, None));
    }

    let db = DbConnection::borrow_from(state);
    let outcome = user::login(db, &form.email, &form.password)?;
    match outcome {
        LoginOutcome::Success(ref session) => {
            tracing::info!("User {} logged in", session.user_id);
            logged_in(state, session)
        }
        _ => {
            tracing::warn!("Failed login for '{}'", form.email);
            Ok(render_login(state, &form, &errors, outcome.error()))
        }
    }
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate<'a> {
    nav: Nav,
    form: &'a RegisterForm,
    errors: &'a FormErrors,
    error: Option<&'a str>,
}

fn render_register(
    state: &State,
    form: &RegisterForm,
    errors: &FormErrors,
    error: Option<&str>,
) -> Response<Body> {
    RegisterTemplate {
        nav: Nav::from_state(state),
        form,
        errors,
        error,
    }
    .to_response(state)
}

/// Registration form
pub fn register(state: &State) -> DocumentResult {
    Ok(render_register(
        state,
        &RegisterForm::default(),
        &FormErrors::new(),
        None,
    ))
}

/// Creates the account and logs the new user in, unless the email is already registered.
pub fn register_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let form: RegisterForm = serde_urlencoded::from_bytes(&post)?;
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(render_register(state, &form, &errors, None));
    }

    let account = NewUser::new(&form.name, &form.email, &form.password);
    let connection = &DbConnection::from_state(state)?;
    if user::find_by_email(connection, &form.email)?.is_some() {
        return Ok(render_register(state, &form, &errors, Some(USER_EXISTS)));
    }

    let new_user = user::create(connection, &account)?;
    tracing::info!("Registered user {} ({})", new_user.id, new_user.name);
    let session = Session::open(connection, new_user.id)?;
    logged_in(state, &session)
}

/// Ends the current session and expires its cookie.
pub fn logout(state: &State) -> DocumentResult {
    let session = require_login(state)?;
    let connection = &DbConnection::from_state(state)?;

    user::logout(connection, &session.id)?;
    tracing::info!("User {} logged out", session.user_id);

    let mut response = see_other(state, "/");
    // Expire it under the same path and domain it was set with
    let mut cookie = session_cookie(state, "");
    cookie.set_max_age(time::Duration::zero());
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse()?);

    Ok(response)
}
