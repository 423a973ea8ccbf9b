use chrono::Local;
use diesel::{prelude::*, result::Error as DieselError, Connection as _};

use crate::{
    config::COMRAK_POST_OPTS,
    db::Connection,
    schema::{comments, posts, users},
    user::User,
};

/// Format of the display date stored with each post.
const DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Clone, Debug, Queryable, Identifiable)]
pub struct Post {
    /// The post's numeric id
    pub id: i32,
    /// The user who wrote the post
    pub author_id: i32,
    /// The title of the post, unique among posts
    pub title: String,
    pub subtitle: String,
    /// Human readable date of publishing
    pub date: String,
    /// The post's body as markdown
    pub body: String,
    /// The header image
    pub img_url: String,
}

impl Post {
    /// The body rendered to HTML.
    pub fn formatted(&self) -> String {
        comrak::markdown_to_html(&self.body, &COMRAK_POST_OPTS)
    }
}

#[derive(Insertable)]
#[table_name = "posts"]
pub struct NewPost<'a> {
    pub author_id: i32,
    pub title: &'a str,
    pub subtitle: &'a str,
    pub date: String,
    pub body: &'a str,
    pub img_url: &'a str,
}

/// Fields rewritten by an edit. Id, author and date stay as they are.
#[derive(AsChangeset)]
#[table_name = "posts"]
pub struct PostChanges<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub body: &'a str,
    pub img_url: &'a str,
}

/// Today's date the way it's displayed on posts, e.g. "October 18, 2026".
pub fn today() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

/// All posts with their authors, in the order they were stored.
pub fn list(connection: &Connection) -> Result<Vec<(Post, User)>, DieselError> {
    posts::table
        .inner_join(users::table)
        .order(posts::id.asc())
        .load(connection)
}

pub fn view(connection: &Connection, id: i32) -> Result<Post, DieselError> {
    posts::table.find(id).first(connection)
}

/// Whether a post other than `except` already uses `title`.
pub fn title_taken(
    connection: &Connection,
    title: &str,
    except: Option<i32>,
) -> Result<bool, DieselError> {
    let mut query = posts::table
        .select(posts::id)
        .filter(posts::title.eq(title))
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(posts::id.ne(id));
    }
    Ok(query.first::<i32>(connection).optional()?.is_some())
}

pub fn submit(connection: &Connection, post: &NewPost) -> Result<usize, DieselError> {
    diesel::insert_into(posts::table)
        .values(post)
        .execute(connection)
}

pub fn edit(connection: &Connection, id: i32, changes: &PostChanges) -> Result<usize, DieselError> {
    diesel::update(posts::table.find(id))
        .set(changes)
        .execute(connection)
}

/// Deletes a post together with its comments. Returns the number of posts removed.
pub fn delete(connection: &Connection, id: i32) -> Result<usize, DieselError> {
    connection.transaction(|| {
        diesel::delete(comments::table.filter(comments::post_id.eq(id))).execute(connection)?;
        diesel::delete(posts::table.find(id)).execute(connection)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comment, db, user};

    fn new_post<'a>(author_id: i32, title: &'a str) -> NewPost<'a> {
        NewPost {
            author_id,
            title,
            subtitle: "A subtitle",
            date: today(),
            body: "Some *markdown*",
            img_url: "https://example.com/header.jpg",
        }
    }

    #[test]
    fn list_in_storage_order() {
        let connection = db::memory();
        let admin = user::create(
            &connection,
            &user::NewUser::new("Admin", "admin@example.com", "pw"),
        )
        .unwrap();
        submit(&connection, &new_post(admin.id, "First")).unwrap();
        submit(&connection, &new_post(admin.id, "Second")).unwrap();

        let listed = list(&connection).unwrap();
        let titles: Vec<&str> = listed.iter().map(|(post, _)| post.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second"]);
        assert!(listed.iter().all(|(_, author)| author.name == "Admin"));
    }

    #[test]
    fn edit_preserves_id_author_and_date() {
        let connection = db::memory();
        let admin = user::create(
            &connection,
            &user::NewUser::new("Admin", "admin@example.com", "pw"),
        )
        .unwrap();
        submit(&connection, &new_post(admin.id, "Original")).unwrap();
        let before = view(&connection, 1).unwrap();

        let changes = PostChanges {
            title: "Renamed",
            subtitle: "New subtitle",
            body: "New body",
            img_url: "https://example.com/other.jpg",
        };
        assert_eq!(edit(&connection, before.id, &changes).unwrap(), 1);

        let after = view(&connection, before.id).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.author_id, admin.id);
        assert_eq!(after.date, before.date);
        assert_eq!(after.title, "Renamed");
        assert_eq!(after.subtitle, "New subtitle");
        assert_eq!(after.body, "New body");
        assert_eq!(after.img_url, "https://example.com/other.jpg");
    }

    #[test]
    fn titles_are_unique() {
        let connection = db::memory();
        let admin = user::create(
            &connection,
            &user::NewUser::new("Admin", "admin@example.com", "pw"),
        )
        .unwrap();
        submit(&connection, &new_post(admin.id, "Taken")).unwrap();

        assert!(title_taken(&connection, "Taken", None).unwrap());
        assert!(!title_taken(&connection, "Taken", Some(1)).unwrap());
        assert!(!title_taken(&connection, "Free", None).unwrap());
        assert!(submit(&connection, &new_post(admin.id, "Taken")).is_err());
    }

    #[test]
    fn delete_removes_comments() {
        let connection = db::memory();
        let admin = user::create(
            &connection,
            &user::NewUser::new("Admin", "admin@example.com", "pw"),
        )
        .unwrap();
        submit(&connection, &new_post(admin.id, "Doomed")).unwrap();
        submit(&connection, &new_post(admin.id, "Kept")).unwrap();
        for (post_id, text) in &[(1, "first"), (1, "second"), (2, "third")] {
            let new = comment::NewComment {
                text,
                author_id: admin.id,
                post_id: *post_id,
            };
            comment::submit(&connection, &new).unwrap();
        }

        assert_eq!(delete(&connection, 1).unwrap(), 1);
        assert!(matches!(view(&connection, 1), Err(DieselError::NotFound)));
        assert_eq!(comment::list(&connection, 1).unwrap().len(), 0);
        assert_eq!(comment::list(&connection, 2).unwrap().len(), 1);
        assert_eq!(delete(&connection, 1).unwrap(), 0);
    }

    #[test]
    fn markdown_body() {
        let post = Post {
            id: 1,
            author_id: 1,
            title: String::new(),
            subtitle: String::new(),
            date: today(),
            body: String::from("Hello *world*"),
            img_url: String::new(),
        };
        assert_eq!(post.formatted(), "<p>Hello <em>world</em></p>\n");
    }
}
