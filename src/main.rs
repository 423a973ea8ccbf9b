//! A simple server-rendered blog.
//!
//! Anyone can read posts, registered users can comment, and the admin (the user with id 1)
//! manages posts. It has the following address scheme:
//! * `/` - List all posts
//! * `/about`, `/contact` - Static pages
//! * `/post/<id>` - View a post; POST submits a comment
//! * `/add` - Create a post (admin)
//! * `/edit/<id>` - Edit a post (admin)
//! * `/delete/<id>` - Delete a post and its comments (admin)
//! * `/login`, `/register`, `/logout` - Session handling
//! * `/static/*` - Stylesheets and other assets

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate serde;

pub mod comment;
pub mod config;
pub mod db;
pub mod document;
pub mod form;
pub mod handler;
pub mod post;
pub mod schema;
pub mod user;


use gotham::{
    middleware::cookie::CookieParser,
    middleware::state::StateMiddleware,
    pipeline::new_pipeline,
    pipeline::single::single_pipeline,
    router::builder::{build_router, DefineSingleRoute, DrawRoutes},
    router::response::extender::ResponseExtender,
    router::Router,
    state::State,
};
use http::status::StatusCode;
use hyper::{Body, Response};

use std::{borrow::Cow, path::Path};

use crate::{config::Settings, db::DbConnection, user::SessionMiddleware};

/// Response extender for 404 errors
pub struct NotFound;

impl ResponseExtender<Body> for NotFound {
    fn extend(&self, _state: &mut State, res: &mut Response<Body>) {
        let body = res.body_mut();
        *body = "404 Not found".into();
    }
}

/// Builds the request router
pub fn router(settings: Settings, connection: DbConnection) -> Router {
    // The directory static assets are served from. Is:
    // /usr/share/scribe if it exists, otherwise
    // STATIC_DIR compile-time environment variable if defined, otherwise
    // local directory 'static'
    let assets_dir: Cow<str> = if Path::new("/usr/share/scribe").is_dir() {
        "/usr/share/scribe".into()
    } else if let Some(compile_env) = option_env!("STATIC_DIR") {
        compile_env.into()
    } else {
        "static".into()
    };

    // Build pipeline
    let (chain, pipelines) = single_pipeline(
        new_pipeline()
            .add(StateMiddleware::new(connection))
            .add(StateMiddleware::new(settings))
            .add(CookieParser)
            .add(SessionMiddleware)
            .build(),
    );

    build_router(chain, pipelines, |route| {
        use crate::document::{index, post, user};

        route.get("/").to(handler!(index::handler));
        route.get("/about").to(handler!(index::about));
        route.get("/contact").to(handler!(index::contact));

        route
            .get("/post/:id")
            .with_path_extractor::<post::PostPath>()
            .to(handler!(post::view));
        route
            .post("/post/:id")
            .with_path_extractor::<post::PostPath>()
            .to(body_handler!(post::comment_post));

        route.get("/add").to(handler!(post::add));
        route.post("/add").to(body_handler!(post::add_post));

        route
            .get("/edit/:id")
            .with_path_extractor::<post::PostPath>()
            .to(handler!(post::edit));
        route
            .post("/edit/:id")
            .with_path_extractor::<post::PostPath>()
            .to(body_handler!(post::edit_post));

        route
            .get("/delete/:id")
            .with_path_extractor::<post::PostPath>()
            .to(handler!(post::delete));

        route
            .get("/login")
            .with_query_string_extractor::<user::LoginQuery>()
            .to(handler!(user::login));
        route.post("/login").to(body_handler!(user::login_post));

        route.get("/register").to(handler!(user::register));
        route
            .post("/register")
            .to(body_handler!(user::register_post));

        route.get("/logout").to(handler!(user::logout));

        route.get("/static/*").to_dir(&*assets_dir);

        // Error responders
        route.add_response_extender(StatusCode::NOT_FOUND, NotFound);
    })
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), failure::Error> {
    init_tracing();

    let settings = Settings::load()?;
    let connection = DbConnection::from_url(&settings.database_url)?;
    let address = settings.host_address.clone();

    tracing::info!("Running at {}", address);
    gotham::start(address, router(settings, connection));
    Ok(())
}
