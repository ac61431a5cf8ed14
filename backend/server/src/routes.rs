use std::sync::Arc;

use axum::{
    Form,
    extract::{
        Path, Query, State,
        rejection::{FormRejection, PathRejection},
    },
    response::{Html, IntoResponse, Response},
};
use bank::{BankError, carts, catalog, checkout, users};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::AppError,
    forms::{FormErrors, INVALID_LOGIN, LoginForm, QuantityForm, SignupStep1, SignupStep2},
    pages::{self, Context},
    session::{CurrentUser, Level, Session},
    state,
    utils::{LOGIN_REDIRECT_URL, found, safe_next},
};

type AppState = Arc<state::State>;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    search: Option<String>,
}

async fn render(
    state: &AppState,
    mut session: Session,
    username: Option<String>,
    page: impl FnOnce(&Context) -> Html<String>,
) -> Result<Response, AppError> {
    let ctx = Context {
        username,
        messages: session.take_messages(),
    };
    let html = page(&ctx);
    let jar = session.commit(state).await?;

    Ok((jar, html).into_response())
}

async fn redirect(state: &AppState, session: Session, to: &str) -> Result<Response, AppError> {
    let jar = session.commit(state).await?;

    Ok((jar, found(to)).into_response())
}

pub async fn home_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let username = session.user(&state).await?.map(|user| user.username);

    render(&state, session, username, pages::home).await
}

pub async fn login_page_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    let username = session.user(&state).await?.map(|user| user.username);
    let next = safe_next(query.next.as_deref()).map(str::to_string);

    render(&state, session, username, |ctx| {
        pages::login(ctx, "", next.as_deref(), &FormErrors::default(), None)
    })
    .await
}

pub async fn login_handler(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).map(str::to_string);

    let (username, password) = match form.clean() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return render(&state, session, None, |ctx| {
                pages::login(ctx, &form.username, next.as_deref(), &errors, None)
            })
            .await;
        }
    };

    let lookup = username.clone();
    let user = state
        .db
        .call(move |conn| users::authenticate(conn, &lookup, &password))
        .await?;

    let Some(user) = user else {
        debug!("Rejected login for {username}");
        return render(&state, session, None, |ctx| {
            pages::login(
                ctx,
                &username,
                next.as_deref(),
                &FormErrors::default(),
                Some(INVALID_LOGIN),
            )
        })
        .await;
    };

    info!("User {} logged in", user.username);
    session.login(user.id);

    redirect(&state, session, next.as_deref().unwrap_or(LOGIN_REDIRECT_URL)).await
}

pub async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let jar = session.destroy(&state).await?;

    Ok((jar, found("/")).into_response())
}

pub async fn signup_page_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let username = session.user(&state).await?.map(|user| user.username);
    let email = session.data.signup_email.clone().unwrap_or_default();

    render(&state, session, username, |ctx| {
        pages::signup_step1(ctx, &email, &FormErrors::default())
    })
    .await
}

pub async fn signup_handler(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<SignupStep1>,
) -> Result<Response, AppError> {
    let raw_email = form.email.clone();
    let validated = state.db.call(move |conn| form.validate(conn)).await?;

    match validated {
        Ok(email) => {
            session.data.signup_email = Some(email);
            redirect(&state, session, "/signup/step2/").await
        }
        Err(errors) => {
            let username = session.user(&state).await?.map(|user| user.username);

            render(&state, session, username, |ctx| {
                pages::signup_step1(ctx, &raw_email, &errors)
            })
            .await
        }
    }
}

async fn start_signup(state: &AppState, mut session: Session) -> Result<Response, AppError> {
    session.flash(Level::Info, "Enter your email address to start signing up.");

    redirect(state, session, "/signup/").await
}

pub async fn signup_step2_page_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    if session.data.signup_email.is_none() {
        return start_signup(&state, session).await;
    }

    let username = session.user(&state).await?.map(|user| user.username);

    render(&state, session, username, |ctx| {
        pages::signup_step2(ctx, "", "", &FormErrors::default())
    })
    .await
}

pub async fn signup_step2_handler(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<SignupStep2>,
) -> Result<Response, AppError> {
    let Some(email) = session.data.signup_email.clone() else {
        return start_signup(&state, session).await;
    };

    let (raw_username, raw_address) = (form.username.clone(), form.address.clone());
    let created = state
        .db
        .call(move |conn| {
            let registration = match form.validate(conn)? {
                Ok(registration) => registration,
                Err(errors) => return Ok(Err(errors)),
            };

            let user = users::create_user(
                conn,
                &users::NewUser {
                    username: &registration.username,
                    email: &email,
                    password: &registration.password,
                    address: &registration.address,
                },
            )?;

            Ok(Ok(user))
        })
        .await?;

    match created {
        Ok(user) => {
            info!("Registered user {}", user.username);
            session.data.signup_email = None;
            session.login(user.id);
            session.flash(Level::Success, format!("Welcome, {}!", user.username));

            redirect(&state, session, LOGIN_REDIRECT_URL).await
        }
        Err(errors) => {
            let username = session.user(&state).await?.map(|user| user.username);

            render(&state, session, username, |ctx| {
                pages::signup_step2(ctx, &raw_username, &raw_address, &errors)
            })
            .await
        }
    }
}

pub async fn supermarkets_handler(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let search = query.search.clone();
    let listings = state
        .db
        .call(move |conn| catalog::list_supermarkets_with_products(conn, search.as_deref()))
        .await?;

    render(&state, session, Some(user.username), |ctx| {
        pages::supermarkets(ctx, &listings, query.search.as_deref())
    })
    .await
}

pub async fn shared_cart_handler(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
) -> Result<Response, AppError> {
    let (user_id, name) = (user.id, state.config.shared_cart_name.clone());
    let (cart, items) = state
        .db
        .call(move |conn| {
            let cart = carts::shared_cart_for(conn, user_id, &name)?;
            let items = carts::items(conn, cart.id)?;

            Ok((cart, items))
        })
        .await?;
    let summary = checkout::summarize(items);

    render(&state, session, Some(user.username), |ctx| {
        pages::shared_cart(ctx, &cart, &summary)
    })
    .await
}

pub async fn add_to_cart_handler(
    State(state): State<AppState>,
    CurrentUser { user, mut session }: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
    form: Result<Form<QuantityForm>, FormRejection>,
) -> Result<Response, AppError> {
    let (Path(product_id), Form(form)) = (path?, form?);
    let quantity = match form.quantity(Some(1)) {
        Ok(0) => Err("Quantity must be at least 1.".to_string()),
        parsed => parsed,
    };

    let quantity = match quantity {
        Ok(quantity) => quantity,
        Err(message) => {
            session.flash(Level::Error, message);
            return redirect(&state, session, "/supermarkets/").await;
        }
    };

    let (user_id, name) = (user.id, state.config.shared_cart_name.clone());
    let item = state
        .db
        .call(move |conn| {
            let product = catalog::get_product(conn, product_id)?;
            let cart = carts::shared_cart_for(conn, user_id, &name)?;

            carts::add_item(conn, cart.id, product.id, Some(user_id), quantity)
        })
        .await;

    let item = match item {
        Ok(item) => item,
        Err(AppError::Bank(BankError::QuantityTooLarge { max })) => {
            session.flash(
                Level::Error,
                format!("The cart can hold at most {max} of that product."),
            );
            return redirect(&state, session, "/supermarkets/").await;
        }
        Err(e) => return Err(e),
    };

    debug!("{} added {item} to cart {}", user.username, item.cart_id);
    session.flash(
        Level::Success,
        format!("{} added to the cart.", item.product.name),
    );

    redirect(&state, session, "/supermarkets/").await
}

pub async fn update_quantity_handler(
    State(state): State<AppState>,
    CurrentUser { user, mut session }: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
    form: Result<Form<QuantityForm>, FormRejection>,
) -> Result<Response, AppError> {
    let (Path(item_id), Form(form)) = (path?, form?);
    let quantity = match form.quantity(None) {
        Ok(quantity) => quantity,
        Err(message) => {
            session.flash(Level::Error, message);
            return redirect(&state, session, "/cart/").await;
        }
    };

    let (user_id, name) = (user.id, state.config.shared_cart_name.clone());
    let updated = state
        .db
        .call(move |conn| {
            let cart = carts::shared_cart_for(conn, user_id, &name)?;
            carts::update_quantity(conn, cart.id, item_id, quantity)
        })
        .await;

    match updated {
        Ok(Some(item)) => session.flash(
            Level::Success,
            format!("Updated {} to {}.", item.product.name, item.quantity),
        ),
        Ok(None) => session.flash(Level::Success, "Item removed from the cart."),
        Err(e) => denied(&mut session, &user.username, item_id, e)?,
    }

    redirect(&state, session, "/cart/").await
}

pub async fn remove_from_cart_handler(
    State(state): State<AppState>,
    CurrentUser { user, mut session }: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(item_id) = path?;
    let (user_id, name) = (user.id, state.config.shared_cart_name.clone());
    let removed = state
        .db
        .call(move |conn| {
            let cart = carts::shared_cart_for(conn, user_id, &name)?;
            carts::remove_item(conn, cart.id, item_id)
        })
        .await;

    match removed {
        Ok(item) => session.flash(
            Level::Success,
            format!("Removed {} from the cart.", item.product.name),
        ),
        Err(e) => denied(&mut session, &user.username, item_id, e)?,
    }

    redirect(&state, session, "/cart/").await
}

/// Turns a refused cart change into a flash message. Anything else is
/// propagated.
fn denied(
    session: &mut Session,
    username: &str,
    item_id: i64,
    error: AppError,
) -> Result<(), AppError> {
    match error {
        AppError::Bank(BankError::NotPermitted) => {
            info!("{username} tried to change item {item_id} outside their cart");
            session.flash(Level::Error, "You can only change items in your own cart.");
        }
        AppError::Bank(BankError::NotFound(_)) => {
            session.flash(Level::Error, "That item is no longer in the cart.");
        }
        AppError::Bank(BankError::QuantityTooLarge { max }) => {
            session.flash(Level::Error, format!("Quantity must be at most {max}."));
        }
        e => return Err(e),
    }

    Ok(())
}

pub async fn checkout_handler(
    State(state): State<AppState>,
    CurrentUser { user, session }: CurrentUser,
) -> Result<Response, AppError> {
    let (user_id, name) = (user.id, state.config.shared_cart_name.clone());
    let items = state
        .db
        .call(move |conn| {
            let cart = carts::shared_cart_for(conn, user_id, &name)?;
            carts::items(conn, cart.id)
        })
        .await?;
    let summary = checkout::summarize(items);

    render(&state, session, Some(user.username), |ctx| {
        pages::checkout(ctx, &summary)
    })
    .await
}
