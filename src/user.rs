use chrono::{Duration, NaiveDateTime, Utc};
use cookie::CookieJar;
use diesel::{prelude::*, result::Error as DieselError};
use futures::future;
use gotham::{
    handler::HandlerFuture,
    helpers::http::response::create_response,
    middleware::Middleware,
    state::{FromState, State},
};
use gotham_derive::{NewMiddleware, StateData};
use hmac::Hmac;
use rand::{distributions::Alphanumeric, prelude::*};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    db::{Connection, DbConnection},
    schema::{sessions, users},
};

/// Id of the single account allowed to manage posts.
pub const ADMIN_ID: i32 = 1;
/// Name of the cookie holding the session id.
pub const SESSION_COOKIE: &str = "session";

const SALT_LEN: usize = 8;
const SESSION_LEN: usize = 24;
const KEY_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 260_000;
const PBKDF2_METHOD: &str = "pbkdf2:sha256";

#[derive(Clone, Debug, Queryable, Identifiable, StateData)]
pub struct User {
    /// The numeric user id
    pub id: i32,
    /// The user's display name
    pub name: String,
    /// The user's email address, used to log in
    pub email: String,
    /// The hashed password
    password: String,
}

impl User {
    /// Verify the supplied password matches the users
    pub fn verify(&self, password: &str) -> bool {
        verify(password, &self.password)
    }

    pub fn is_admin(&self) -> bool {
        self.id == ADMIN_ID
    }

    pub fn avatar(&self) -> String {
        gravatar(&self.email)
    }
}

/// A user ready to be stored, with the password already hashed
#[derive(Insertable)]
#[table_name = "users"]
pub struct NewUser<'a> {
    name: &'a str,
    email: &'a str,
    password: String,
}

impl<'a> NewUser<'a> {
    /// Hashes `password`. This is slow, so do it before taking the database lock.
    pub fn new(name: &'a str, email: &'a str, password: &str) -> Self {
        NewUser {
            name,
            email,
            password: hash(password),
        }
    }
}

/// Result of a login attempt
pub enum LoginOutcome {
    /// The credentials were valid and a session was stored
    Success(Session),
    UnknownUser,
    WrongPassword,
}

impl LoginOutcome {
    /// The message shown on the login page for a failed attempt.
    pub fn error(&self) -> Option<&'static str> {
        match self {
            LoginOutcome::Success(_) => None,
            LoginOutcome::UnknownUser => Some("User doesn't Exist"),
            LoginOutcome::WrongPassword => Some("Incorrect Password"),
        }
    }
}

/// Create a session if a user with `email` exists and the password matches.
///
/// The database is only locked for the lookup and the session insert, not while the
/// password is checked.
pub fn login(
    db: &DbConnection,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, failure::Error> {
    let user = match find_by_email(&*db.lock()?, email)? {
        Some(user) => user,
        None => return Ok(LoginOutcome::UnknownUser),
    };
    if !user.verify(password) {
        return Ok(LoginOutcome::WrongPassword);
    }
    let session = Session::open(&*db.lock()?, user.id)?;
    Ok(LoginOutcome::Success(session))
}

#[derive(Clone, Debug, Queryable, Insertable, StateData)]
#[table_name = "sessions"]
pub struct Session {
    pub id: String,
    pub user_id: i32,
    pub expires: NaiveDateTime,
}

impl Session {
    /// Generates a new session.
    ///
    /// NB: Must be inserted into the database for the session to be valid.
    pub fn new(user_id: i32) -> Session {
        // Fill array with random data
        let mut id = [0u8; SESSION_LEN];
        StdRng::from_entropy().fill(&mut id[..]);
        Session {
            id: base64::encode_config(&id, base64::URL_SAFE_NO_PAD),
            user_id,
            expires: Utc::now().naive_utc() + Duration::days(30),
        }
    }

    /// Generates a session for `user_id` and stores it.
    pub fn open(connection: &Connection, user_id: i32) -> Result<Session, DieselError> {
        let session = Session::new(user_id);
        diesel::insert_into(sessions::table)
            .values(&session)
            .execute(connection)?;
        Ok(session)
    }

    /// Get the unexpired session with the specified id along with its user
    pub fn from_id(
        id: &str,
        connection: &Connection,
    ) -> Result<Option<(Session, User)>, DieselError> {
        sessions::table
            .inner_join(users::table)
            .filter(sessions::id.eq(id))
            .filter(sessions::expires.gt(Utc::now().naive_utc()))
            .first(connection)
            .optional()
    }
}

/// Loads the session named by the session cookie, putting it and its user into the state.
#[derive(Clone, NewMiddleware)]
pub struct SessionMiddleware;

impl Middleware for SessionMiddleware {
    fn call<C>(self, mut state: State, chain: C) -> Box<HandlerFuture>
    where
        C: FnOnce(State) -> Box<HandlerFuture>,
    {
        let put_session = |state: &mut State| -> Result<(), failure::Error> {
            let id = match CookieJar::try_borrow_from(state).and_then(|jar| jar.get(SESSION_COOKIE))
            {
                Some(cookie) => cookie.value().to_owned(),
                None => return Ok(()),
            };
            let db = DbConnection::borrow_from(state).clone();
            let connection = db.lock()?;
            if let Some((session, user)) = Session::from_id(&id, &connection)? {
                state.put(session);
                state.put(user);
            }
            Ok(())
        };
        match put_session(&mut state) {
            Ok(()) => chain(state),
            Err(e) => {
                tracing::error!("Failed to load session: {}", e);
                let response = create_response(
                    &state,
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    mime::TEXT_PLAIN,
                    e.to_string(),
                );
                Box::new(future::ok((state, response)))
            }
        }
    }
}

/// Hashes a password in werkzeug's format: `pbkdf2:sha256:<iterations>$<salt>$<hex digest>`.
pub fn hash(password: &str) -> String {
    hash_with(password, &generate_salt(), PBKDF2_ITERATIONS)
}

fn hash_with(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = [0u8; KEY_LEN];
    derive(password, salt, iterations, &mut key);
    format!(
        "{}:{}${}${}",
        PBKDF2_METHOD,
        iterations,
        salt,
        hex::encode(&key)
    )
}

/// Checks `password` against a hash produced by [`hash`]. Malformed hashes never match.
pub fn verify(password: &str, hash: &str) -> bool {
    let mut parts = hash.splitn(3, '$');
    let (method, salt, digest) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(salt), Some(digest)) => (method, salt, digest),
        _ => return false,
    };
    let iterations = if method == PBKDF2_METHOD {
        PBKDF2_ITERATIONS
    } else {
        match method
            .strip_prefix(PBKDF2_METHOD)
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|n| n.parse::<u32>().ok())
        {
            Some(n) => n,
            None => return false,
        }
    };
    let expected = match hex::decode(digest) {
        Ok(bytes) if bytes.len() == KEY_LEN => bytes,
        _ => return false,
    };
    let mut actual = [0u8; KEY_LEN];
    derive(password, salt, iterations, &mut actual);
    bool::from(actual[..].ct_eq(&expected[..]))
}

fn derive(password: &str, salt: &str, iterations: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt.as_bytes(), iterations as _, out);
}

/// Generates a new alphanumeric salt of length `SALT_LEN`
fn generate_salt() -> String {
    StdRng::from_entropy()
        .sample_iter(Alphanumeric)
        .take(SALT_LEN)
        .collect()
}

/// Gravatar image url for an email address.
pub fn gravatar(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=100&d=retro&r=g",
        hex::encode(digest)
    )
}

/// Stores a new user and returns it with its assigned id
pub fn create(connection: &Connection, user: &NewUser) -> Result<User, DieselError> {
    diesel::insert_into(users::table)
        .values(user)
        .execute(connection)?;
    users::table
        .filter(users::email.eq(user.email))
        .first(connection)
}

pub fn get(connection: &Connection, id: i32) -> Result<User, DieselError> {
    users::table.find(id).first(connection)
}

pub fn find_by_email(connection: &Connection, email: &str) -> Result<Option<User>, DieselError> {
    users::table
        .filter(users::email.eq(email))
        .first(connection)
        .optional()
}

pub fn logout(connection: &Connection, session: &str) -> Result<usize, DieselError> {
    use crate::schema::sessions::dsl;

    diesel::delete(dsl::sessions.find(session)).execute(connection)
}

#[cfg(test)]
pub fn count(connection: &Connection) -> Result<i64, DieselError> {
    use crate::schema::users::dsl::*;

    users.count().first(connection)
}
