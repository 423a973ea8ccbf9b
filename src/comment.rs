use diesel::{prelude::*, result::Error as DieselError};

use crate::{
    config::COMRAK_OPTS,
    db::Connection,
    schema::{comments, users},
    user::User,
};

#[derive(Clone, Debug, Queryable, Identifiable)]
pub struct Comment {
    /// The unique id of this comment
    pub id: i32,
    /// The comment's content as markdown
    pub text: String,
    /// The user who submitted the comment
    pub author_id: i32,
    /// The id of the post this comment belongs to
    pub post_id: i32,
}

impl Comment {
    /// The text rendered to HTML, with raw HTML escaped.
    pub fn formatted(&self) -> String {
        comrak::markdown_to_html(&self.text, &COMRAK_OPTS)
    }
}

#[derive(Clone, Debug, Insertable)]
#[table_name = "comments"]
pub struct NewComment<'a> {
    pub text: &'a str,
    pub author_id: i32,
    pub post_id: i32,
}

/// Get the comments of a post and their authors, oldest first
pub fn list(connection: &Connection, post: i32) -> Result<Vec<(Comment, User)>, DieselError> {
    comments::table
        .inner_join(users::table)
        .filter(comments::post_id.eq(post))
        .order(comments::id.asc())
        .load(connection)
}

pub fn submit(connection: &Connection, comment: &NewComment) -> Result<usize, DieselError> {
    diesel::insert_into(comments::table)
        .values(comment)
        .execute(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, post, user};

    #[test]
    fn list_with_authors() {
        let connection = db::memory();
        let admin = user::create(
            &connection,
            &user::NewUser::new("Admin", "admin@example.com", "pw"),
        )
        .unwrap();
        let reader = user::create(
            &connection,
            &user::NewUser::new("Reader", "reader@example.com", "pw"),
        )
        .unwrap();
        let new_post = post::NewPost {
            author_id: admin.id,
            title: "Post",
            subtitle: "Subtitle",
            date: post::today(),
            body: "Body",
            img_url: "https://example.com/image.png",
        };
        post::submit(&connection, &new_post).unwrap();

        for (author, text) in &[(&reader, "Nice post"), (&admin, "Thanks")] {
            let new = NewComment {
                text,
                author_id: author.id,
                post_id: 1,
            };
            assert_eq!(submit(&connection, &new).unwrap(), 1);
        }

        let listed = list(&connection, 1).unwrap();
        let pairs: Vec<(&str, &str)> = listed
            .iter()
            .map(|(comment, author)| (comment.text.as_str(), author.name.as_str()))
            .collect();
        assert_eq!(pairs, [("Nice post", "Reader"), ("Thanks", "Admin")]);
        assert!(list(&connection, 2).unwrap().is_empty());
    }

    #[test]
    fn comments_escape_html() {
        let comment = Comment {
            id: 1,
            text: String::from("<script>alert(1)</script>"),
            author_id: 1,
            post_id: 1,
        };
        assert!(!comment.formatted().contains("<script>"));
    }
}
