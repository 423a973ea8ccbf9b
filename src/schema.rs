table! {
    comments (id) {
        id -> Integer,
        text -> Text,
        author_id -> Integer,
        post_id -> Integer,
    }
}

table! {
    posts (id) {
        id -> Integer,
        author_id -> Integer,
        title -> Text,
        subtitle -> Text,
        date -> Text,
        body -> Text,
        img_url -> Text,
    }
}

table! {
    sessions (id) {
        id -> Text,
        user_id -> Integer,
        expires -> Timestamp,
    }
}

table! {
    users (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        password -> Text,
    }
}

joinable!(comments -> posts (post_id));
joinable!(comments -> users (author_id));
joinable!(posts -> users (author_id));
joinable!(sessions -> users (user_id));

allow_tables_to_appear_in_same_query!(comments, posts, sessions, users,);
