//! API request handlers

pub mod posts;
pub mod site;

pub use posts::{create_post, delete_post, get_post, list_posts, update_post};
pub use site::{
    authenticate, delete_verification_token, get_verification_token, list_users,
    set_verification_token, verification_meta_tag, version,
};
