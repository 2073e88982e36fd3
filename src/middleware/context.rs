use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::context::RequestContext;
use crate::server::AppState;

/// Outermost middleware: opens the request's context scope and seeds it with
/// the shared collaborators. The scope guard lives until the inner service
/// finishes, so entries are released on every exit path.
pub async fn context_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::new(state.contexts.clone());
    let _scope = ctx.scope();

    ctx.set_db(state.db.clone());
    ctx.set_renderer(state.renderer.clone());
    ctx.set_token_authority(state.tokens.clone());
    if let Some(hooks) = &state.session_hooks {
        ctx.set_session_hooks(hooks.clone());
    }

    request.extensions_mut().insert(ctx);
    next.run(request).await
}
