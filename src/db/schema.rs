diesel::table! {
    books (id) {
        id -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        user_id -> Int4,
        title -> Text,
        google_books_id -> Text,
        isbn -> Nullable<Text>,
        authors -> Array<Text>,
        publisher -> Nullable<Text>,
        published_date -> Nullable<Text>,
        page_count -> Nullable<Text>,
        img_link -> Nullable<Text>,
        preview_link -> Nullable<Text>,
    }
}

diesel::table! {
    follows (follower_id, following_id) {
        follower_id -> Int4,
        following_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    likes (user_id, question_id) {
        user_id -> Int4,
        question_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    links (question_id, book_id) {
        question_id -> Int4,
        book_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    questions (id) {
        id -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        user_id -> Int4,
        title -> Text,
        description -> Nullable<Text>,
        is_private -> Bool,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        email -> Text,
        hashed_password -> Text,
        user_name -> Text,
        profile_picture -> Nullable<Text>,
        cover_picture -> Nullable<Text>,
    }
}

diesel::joinable!(books -> users (user_id));
diesel::joinable!(likes -> questions (question_id));
diesel::joinable!(likes -> users (user_id));
diesel::joinable!(links -> books (book_id));
diesel::joinable!(links -> questions (question_id));
diesel::joinable!(questions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(books, follows, likes, links, questions, users,);
