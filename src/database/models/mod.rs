pub mod customer;
pub mod revoked_token;
pub mod user;

pub use customer::Customer;
pub use revoked_token::RevokedToken;
pub use user::{NewUser, Role, User, UserStatus, UserUpdate};
