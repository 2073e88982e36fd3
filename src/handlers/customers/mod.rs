use axum::{extract::Request, http::Method, response::Response};
use serde::Deserialize;
use serde_json::json;

use crate::acl::{active_user, predicate, AclMap};
use crate::context::RequestContext;
use crate::database::models::{Customer, Role};
use crate::database::repositories::CustomerRepository;
use crate::error::ApiError;
use crate::handlers::{decode_json_body, path_id, require_db, require_user};
use crate::middleware::ApiResponse;
use crate::router::{handler, loader, Route, Routes};

pub const LIST_CUSTOMERS: &str = "ListCustomers";
pub const CREATE_CUSTOMER: &str = "CreateCustomer";
pub const GET_CUSTOMER: &str = "GetCustomer";

pub fn routes() -> Routes {
    vec![
        Route::new(LIST_CUSTOMERS, Method::GET, "/api/customers", "0.0")
            .version("0.0", handler(list_customers)),
        Route::new(CREATE_CUSTOMER, Method::POST, "/api/customers", "0.0")
            .version("0.0", handler(create_customer)),
        Route::new(GET_CUSTOMER, Method::GET, "/api/customers/{id}", "0.0")
            .version("0.0", handler(get_customer))
            .with_loader(loader(load_customer)),
    ]
}

pub fn acl() -> AclMap {
    let mut map = AclMap::new();
    map.insert(LIST_CUSTOMERS.into(), predicate(|_, _, user| active_user(user)));
    map.insert(CREATE_CUSTOMER.into(), predicate(|_, _, user| active_user(user)));

    // Owners and admins only, decided on the customer the loader stashed.
    // No stashed customer means the load failed, and active users get that
    // error instead of a 403.
    map.insert(
        GET_CUSTOMER.into(),
        predicate(|_, ctx, user| {
            let Some(user) = user.filter(|u| u.is_active()) else {
                return (false, String::new());
            };
            if user.has_role(Role::Admin) {
                return (true, String::new());
            }
            match ctx.current_object::<Customer>() {
                Some(customer) => (customer.owner == user.id, String::new()),
                None => (true, String::new()),
            }
        }),
    );
    map
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub customer: Customer,
}

async fn load_customer(ctx: RequestContext) -> Result<(), ApiError> {
    let customer = CustomerRepository::new(require_db(&ctx)?)
        .get_customer(&path_id(&ctx))
        .await?;
    ctx.set_current_object(customer);
    Ok(())
}

/// GET /api/customers
pub async fn list_customers(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let user = require_user(&ctx)?;
    let owner = (!user.has_role(Role::Admin)).then_some(user.id.as_str());

    let customers = CustomerRepository::new(require_db(&ctx)?)
        .get_customers(owner)
        .await?;

    Ok(ApiResponse::success(json!({ "customers": customers }), "Customer list retrieved").render(&ctx))
}

/// POST /api/customers
pub async fn create_customer(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let user = require_user(&ctx)?;
    let CreateCustomerRequest { mut customer } = decode_json_body(request).await?;
    if !customer.is_valid() {
        return Err(ApiError::bad_request("Invalid customer object"));
    }

    customer.owner = user.id;
    CustomerRepository::new(require_db(&ctx)?)
        .create_customer(&mut customer)
        .await?;

    Ok(ApiResponse::created(json!({ "customer": customer }), "Customer created").render(&ctx))
}

/// GET /api/customers/{id}
pub async fn get_customer(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let customer = ctx
        .current_object::<Customer>()
        .ok_or_else(|| ApiError::bad_request("Customer not found"))?;

    Ok(ApiResponse::success(json!({ "customer": customer }), "Customer retrieved").render(&ctx))
}
