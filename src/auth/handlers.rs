use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_sessions::Session;
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{LoginForm, SignupForm},
        repo_types::User,
        services::AuthError,
        session::{self, CurrentUser, FlashLevel},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(login_submit))
        .route("/signup", get(signup_page).post(signup_submit))
        .route("/dashboard", get(dashboard))
        .route("/room", get(dashboard))
        .route("/logout", get(logout))
        .route("/about", get(about))
        .route("/contact", get(contact))
}

/// Render a view, falling back to a plain page if the renderer fails. No
/// failure on this path may escape to the client as an error response.
fn render_page(state: &AppState, view: &str, ctx: Value) -> Html<String> {
    match state.pages.render(view, &ctx) {
        Ok(html) => Html(html),
        Err(e) => {
            error!(error = %e, view, "page render failed");
            Html("<h1>NexGenHome</h1><p>Something went wrong. Please try again.</p>".into())
        }
    }
}

/// Base render context: pending flashes plus the session username, if any.
async fn page_ctx(session: &Session) -> Value {
    let flashes = session::take_flashes(session).await;
    let mut ctx = json!({ "flashes": flashes });
    if let Some(user) = session::current_user(session).await {
        ctx["username"] = Value::String(user.username);
    }
    ctx
}

fn login_error_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingFields => "Please fill in all details.",
        AuthError::InvalidCredentials => "Invalid username/email or password.",
        _ => "Something went wrong. Please try again.",
    }
}

fn signup_error_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingFields => "All fields are required.",
        AuthError::InvalidEmail => "Please enter a valid email address.",
        AuthError::DuplicateUsername => "Username already exists.",
        AuthError::DuplicateEmail => "Email already registered.",
        _ => "Something went wrong. Please try again.",
    }
}

async fn index(session: Session) -> Redirect {
    if session::current_user(&session).await.is_some() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

#[instrument(skip(state, session))]
async fn login_page(State(state): State<AppState>, session: Session) -> Html<String> {
    let ctx = page_ctx(&session).await;
    render_page(&state, "login", ctx)
}

#[instrument(skip(state, session, form))]
async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.login(&form.username, &form.password).await {
        Ok(user) => {
            if let Err(e) = session::establish(&session, &user).await {
                error!(error = %e, "failed to establish session");
                session::clear(&session).await;
                session::flash(
                    &session,
                    FlashLevel::Error,
                    "Something went wrong. Please try again.",
                )
                .await;
                let ctx = page_ctx(&session).await;
                return render_page(&state, "login", ctx).into_response();
            }
            session::flash(&session, FlashLevel::Success, "Login successful!").await;
            Redirect::to("/dashboard").into_response()
        }
        Err(err) => {
            session::flash(&session, FlashLevel::Error, login_error_message(&err)).await;
            let ctx = page_ctx(&session).await;
            render_page(&state, "login", ctx).into_response()
        }
    }
}

#[instrument(skip(state, session))]
async fn signup_page(State(state): State<AppState>, session: Session) -> Html<String> {
    let ctx = page_ctx(&session).await;
    render_page(&state, "signup", ctx)
}

#[instrument(skip(state, session, form))]
async fn signup_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    match state
        .auth
        .signup(&form.username, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            // Auto-login after signup.
            if let Err(e) = session::establish(&session, &user).await {
                error!(error = %e, "failed to establish session");
                session::clear(&session).await;
                session::flash(
                    &session,
                    FlashLevel::Error,
                    "Something went wrong. Please try again.",
                )
                .await;
                let ctx = page_ctx(&session).await;
                return render_page(&state, "signup", ctx).into_response();
            }
            session::flash(
                &session,
                FlashLevel::Success,
                "Signup successful! Welcome to NexGenHome.",
            )
            .await;
            Redirect::to("/dashboard").into_response()
        }
        Err(err) => {
            session::flash(&session, FlashLevel::Error, signup_error_message(&err)).await;
            let ctx = page_ctx(&session).await;
            render_page(&state, "signup", ctx).into_response()
        }
    }
}

#[instrument(skip(state, session, user), fields(username = %user.username))]
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Html<String> {
    let flashes = session::take_flashes(&session).await;
    let latest = match User::latest(&state.db).await {
        Ok(latest) => latest,
        Err(e) => {
            error!(error = %e, "failed to load latest signup");
            None
        }
    };
    let ctx = json!({
        "flashes": flashes,
        "username": user.username,
        "latest_user": latest.map(|u| u.username),
    });
    render_page(&state, "dashboard", ctx)
}

#[instrument(skip(session))]
async fn logout(session: Session) -> Redirect {
    session::clear(&session).await;
    session::flash(&session, FlashLevel::Success, "You have been logged out.").await;
    Redirect::to("/login")
}

async fn about(State(state): State<AppState>, session: Session) -> Html<String> {
    let ctx = page_ctx(&session).await;
    render_page(&state, "about", ctx)
}

async fn contact(State(state): State<AppState>, session: Session) -> Html<String> {
    let ctx = page_ctx(&session).await;
    render_page(&state, "contact", ctx)
}
