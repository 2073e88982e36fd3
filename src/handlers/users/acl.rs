use crate::acl::{active_admin, active_user, anyone, predicate, AclMap};
use crate::database::models::Role;

use super::{
    CONFIRM_USER, COUNT_USERS, CREATE_USER, DELETE_ALL_USERS, DELETE_USER, GET_USER, LIST_USERS,
    UPDATE_USER, UPDATE_USERS,
};

pub fn acl() -> AclMap {
    let mut map = AclMap::new();

    map.insert(LIST_USERS.into(), predicate(|_, _, user| active_user(user)));
    map.insert(GET_USER.into(), predicate(|_, _, user| active_user(user)));

    // Anyone may sign up; once signed in, only admins create accounts
    map.insert(
        CREATE_USER.into(),
        predicate(|_, _, user| match user {
            None => (true, String::new()),
            Some(_) => active_admin(user),
        }),
    );

    map.insert(UPDATE_USERS.into(), predicate(|_, _, user| active_admin(user)));
    map.insert(DELETE_ALL_USERS.into(), predicate(|_, _, user| active_admin(user)));
    map.insert(DELETE_USER.into(), predicate(|_, _, user| active_admin(user)));
    map.insert(COUNT_USERS.into(), predicate(|_, _, user| active_admin(user)));

    // The link carries the confirmation code
    map.insert(CONFIRM_USER.into(), predicate(|_, _, user| anyone(user)));

    // Admins update anyone, users only their own account
    map.insert(
        UPDATE_USER.into(),
        predicate(|_, ctx, user| {
            let Some(user) = user.filter(|u| u.is_active()) else {
                return (false, String::new());
            };
            if user.has_role(Role::Admin) {
                return (true, String::new());
            }
            let route = ctx.current_route();
            (route.param("id") == Some(user.id.as_str()), String::new())
        }),
    );

    map
}
