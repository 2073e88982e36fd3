mod acl;
mod collection;
mod record;

use axum::http::Method;

use crate::router::{handler, Route, Routes};

pub use acl::acl;

pub const LIST_USERS: &str = "ListUsers";
pub const COUNT_USERS: &str = "CountUsers";
pub const CREATE_USER: &str = "CreateUser";
pub const UPDATE_USERS: &str = "UpdateUsers";
pub const DELETE_ALL_USERS: &str = "DeleteAllUsers";
pub const GET_USER: &str = "GetUser";
pub const CONFIRM_USER: &str = "ConfirmUser";
pub const UPDATE_USER: &str = "UpdateUser";
pub const DELETE_USER: &str = "DeleteUser";

pub fn routes() -> Routes {
    vec![
        Route::new(LIST_USERS, Method::GET, "/api/users", "0.0")
            .version("0.0", handler(collection::list_users)),
        Route::new(COUNT_USERS, Method::GET, "/api/users/count", "0.0")
            .version("0.0", handler(collection::count_users)),
        Route::new(CREATE_USER, Method::POST, "/api/users", "0.0")
            .version("0.0", handler(collection::create_user)),
        Route::new(UPDATE_USERS, Method::PUT, "/api/users", "0.0")
            .version("0.0", handler(collection::update_users)),
        Route::new(DELETE_ALL_USERS, Method::DELETE, "/api/users", "0.0")
            .version("0.0", handler(collection::delete_all_users)),
        Route::new(GET_USER, Method::GET, "/api/users/{id}", "0.0")
            .version("0.0", handler(record::get_user)),
        // GET so the confirmation link can be followed from an email
        Route::new(CONFIRM_USER, Method::GET, "/api/users/{id}/confirm", "0.0")
            .version("0.0", handler(record::confirm_user)),
        Route::new(UPDATE_USER, Method::PUT, "/api/users/{id}", "0.0")
            .version("0.0", handler(record::update_user)),
        Route::new(DELETE_USER, Method::DELETE, "/api/users/{id}", "0.0")
            .version("0.0", handler(record::delete_user)),
    ]
}
