//! # Pages
//!
//! Server-rendered HTML. Each page names its template in a `data-template`
//! attribute on `<main>`.
//!
//! All user-supplied text goes through [`text`] or [`attr`] before it reaches
//! the markup.
use axum::response::Html;
use bank::{
    catalog::Listing,
    checkout::{CheckoutSummary, UNKNOWN_CONTRIBUTOR},
    models::{Cart, Product},
};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::{forms::FormErrors, session::Flash};

pub const EMPTY_CART: &str = "Your cart is empty";

/// What every page needs from the request.
#[derive(Debug, Default)]
pub struct Context {
    pub username: Option<String>,
    pub messages: Vec<Flash>,
}

fn text(value: &str) -> String {
    encode_text(value).into_owned()
}

fn attr(value: &str) -> String {
    encode_double_quoted_attribute(value).into_owned()
}

fn layout(ctx: &Context, title: &str, template: &str, body: &str) -> Html<String> {
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Shared Cart</title>
</head>
<body>
<nav>
<a href="/">Home</a>
"#,
        title = text(title),
    ));

    match &ctx.username {
        Some(username) => {
            html.push_str(&format!(
                r#"<a href="/supermarkets/">Supermarkets</a>
<a href="/cart/">Cart</a>
<a href="/checkout/">Checkout</a>
<span class="user">Signed in as {}</span>
<form method="post" action="/logout/"><button type="submit">Log out</button></form>
"#,
                text(username),
            ));
        }
        None => {
            html.push_str(
                r#"<a href="/login/">Log in</a>
<a href="/signup/">Sign up</a>
"#,
            );
        }
    }
    html.push_str("</nav>\n");

    if !ctx.messages.is_empty() {
        html.push_str("<ul class=\"messages\">\n");
        for message in &ctx.messages {
            html.push_str(&format!(
                "<li class=\"{}\">{}</li>\n",
                message.level.as_str(),
                text(&message.text),
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str(&format!(
        "<main data-template=\"{}\">\n{body}</main>\n</body>\n</html>\n",
        attr(template),
    ));

    Html(html)
}

fn field_errors(errors: &FormErrors, field: &str) -> String {
    let messages: Vec<String> = errors
        .field(field)
        .map(|message| format!("<li>{}</li>", text(message)))
        .collect();

    if messages.is_empty() {
        String::new()
    } else {
        format!("<ul class=\"errorlist\">{}</ul>\n", messages.concat())
    }
}

pub fn home(ctx: &Context) -> Html<String> {
    let body = match &ctx.username {
        Some(username) => format!(
            r#"<h1>Welcome back, {}</h1>
<p>Everyone signed in shares one cart. <a href="/supermarkets/">Start shopping</a>.</p>
"#,
            text(username),
        ),
        None => r#"<h1>Shared Cart</h1>
<p>Shop together across supermarkets and split the bill at checkout.</p>
<p><a href="/signup/">Sign up</a> or <a href="/login/">log in</a> to get started.</p>
"#
        .to_string(),
    };

    layout(ctx, "Home", "home.html", &body)
}

pub fn login(
    ctx: &Context,
    username: &str,
    next: Option<&str>,
    errors: &FormErrors,
    invalid_login: Option<&str>,
) -> Html<String> {
    let mut body = String::from("<h1>Log in</h1>\n");

    if let Some(message) = invalid_login {
        body.push_str(&format!(
            "<ul class=\"errorlist nonfield\"><li>{}</li></ul>\n",
            text(message),
        ));
    }

    body.push_str(&format!(
        r#"<form method="post" action="/login/">
<p><label for="id_username">Username:</label>
<input type="text" name="username" id="id_username" maxlength="150" value="{username}" required></p>
{username_errors}<p><label for="id_password">Password:</label>
<input type="password" name="password" id="id_password" required></p>
{password_errors}<input type="hidden" name="next" value="{next}">
<button type="submit">Log in</button>
</form>
<p>New here? <a href="/signup/">Create an account</a>.</p>
"#,
        username = attr(username),
        username_errors = field_errors(errors, "username"),
        password_errors = field_errors(errors, "password"),
        next = attr(next.unwrap_or("")),
    ));

    layout(ctx, "Log in", "login.html", &body)
}

pub fn signup_step1(ctx: &Context, email: &str, errors: &FormErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Sign up</h1>
<p>Step 1 of 2</p>
<form method="post" action="/signup/">
<p><label for="id_email">Email:</label>
<input type="email" name="email" id="id_email" maxlength="254" value="{email}" required></p>
{email_errors}<button type="submit">Next</button>
</form>
"#,
        email = attr(email),
        email_errors = field_errors(errors, "email"),
    );

    layout(ctx, "Sign up", "registration/signup.html", &body)
}

pub fn signup_step2(
    ctx: &Context,
    username: &str,
    address: &str,
    errors: &FormErrors,
) -> Html<String> {
    let body = format!(
        r#"<h1>Sign up</h1>
<p>Step 2 of 2</p>
<form method="post" action="/signup/step2/">
<p><label for="id_username">Username:</label>
<input type="text" name="username" id="id_username" maxlength="150" value="{username}" required></p>
{username_errors}<p><label for="id_password">Password:</label>
<input type="password" name="password" id="id_password" required></p>
{password_errors}<p><label for="id_address">University Name:</label>
<input type="text" name="address" id="id_address" maxlength="150" value="{address}" required></p>
{address_errors}<button type="submit">Create account</button>
</form>
"#,
        username = attr(username),
        username_errors = field_errors(errors, "username"),
        password_errors = field_errors(errors, "password"),
        address = attr(address),
        address_errors = field_errors(errors, "address"),
    );

    layout(ctx, "Sign up", "registration/signup_step2.html", &body)
}

fn product_card(product: &Product) -> String {
    let healthy = if product.is_healthy {
        r#"<span class="badge healthy">Healthy</span>"#
    } else {
        ""
    };

    format!(
        r#"<li class="product">
<img src="/static/{image}" alt="{alt}" width="120">
<h3>{name}</h3> {healthy}
<p class="category">{category}</p>
<p class="price">${price}</p>
<p class="nutrition">{calories} kcal &middot; protein {protein:.1} g &middot; carbs {carbs:.1} g &middot; fat {fat:.1} g &middot; health score {score}</p>
<form method="post" action="/cart/add/{id}/">
<input type="number" name="quantity" value="1" min="1">
<button type="submit">Add to cart</button>
</form>
</li>
"#,
        image = attr(&product.image),
        alt = attr(&product.name),
        name = text(&product.name),
        category = text(&product.category),
        price = product.price,
        calories = product.calories,
        protein = product.protein,
        carbs = product.carbohydrates,
        fat = product.fat,
        score = product.health_score,
        id = product.id,
    )
}

pub fn supermarkets(ctx: &Context, listings: &[Listing], search: Option<&str>) -> Html<String> {
    let search = search.unwrap_or("");
    let mut body = format!(
        r#"<h1>Supermarkets</h1>
<form method="get" action="/supermarkets/" class="search">
<input type="search" name="search" value="{}" placeholder="Search products">
<button type="submit">Search</button>
</form>
"#,
        attr(search),
    );

    if !search.trim().is_empty() {
        body.push_str(&format!(
            r#"<p class="search-summary">Results for "{}". <a href="/supermarkets/">Clear</a></p>
"#,
            text(search.trim()),
        ));
    }

    if listings.is_empty() {
        body.push_str("<p>No supermarkets yet.</p>\n");
    }

    for listing in listings {
        body.push_str(&format!(
            "<section class=\"supermarket\">\n<h2>{}</h2>\n<p class=\"location\">{}</p>\n",
            text(&listing.supermarket.name),
            text(&listing.supermarket.location),
        ));

        if listing.products.is_empty() {
            body.push_str("<p>No products found.</p>\n");
        } else {
            body.push_str("<ul class=\"products\">\n");
            for product in &listing.products {
                body.push_str(&product_card(product));
            }
            body.push_str("</ul>\n");
        }
        body.push_str("</section>\n");
    }

    layout(ctx, "Supermarkets", "supermarkets.html", &body)
}

pub fn shared_cart(ctx: &Context, cart: &Cart, summary: &CheckoutSummary) -> Html<String> {
    let mut body = format!(
        "<h1>Shared Cart</h1>\n<p class=\"cart-name\">{}</p>\n",
        text(&cart.name),
    );

    if summary.is_empty() {
        body.push_str(&format!(
            r#"<p class="empty">{EMPTY_CART}.</p>
<p><a href="/supermarkets/">Browse supermarkets</a></p>
"#,
        ));
        return layout(ctx, "Shared Cart", "shared_cart.html", &body);
    }

    body.push_str(
        "<table class=\"cart\">\n<thead><tr><th>Product</th><th>Price</th><th>Quantity</th>\
         <th>Added by</th><th>Total</th><th></th></tr></thead>\n<tbody>\n",
    );

    for line in &summary.lines {
        let item = &line.item;
        let added_by = item
            .added_by
            .as_ref()
            .map(|c| c.username.as_str())
            .unwrap_or(UNKNOWN_CONTRIBUTOR);

        body.push_str(&format!(
            r#"<tr>
<td>{name}</td>
<td>${price}</td>
<td><form method="post" action="/cart/update/{id}/">
<input type="number" name="quantity" value="{quantity}" min="0">
<button type="submit">Update</button>
</form></td>
<td>{added_by}</td>
<td>${total}</td>
<td><form method="post" action="/cart/remove/{id}/"><button type="submit">Remove</button></form></td>
</tr>
"#,
            name = text(&item.product.name),
            price = item.product.price,
            id = item.id,
            quantity = item.quantity,
            added_by = text(added_by),
            total = line.total_price,
        ));
    }

    body.push_str(&format!(
        r#"</tbody>
<tfoot><tr><th colspan="4">Total</th><th>${total}</th><th></th></tr></tfoot>
</table>
<p><a href="/checkout/">Proceed to checkout</a></p>
"#,
        total = summary.total_price,
    ));

    layout(ctx, "Shared Cart", "shared_cart.html", &body)
}

pub fn checkout(ctx: &Context, summary: &CheckoutSummary) -> Html<String> {
    let mut body = String::from("<h1>Checkout</h1>\n");

    if summary.is_empty() {
        body.push_str(&format!(
            r#"<p class="empty">{EMPTY_CART}.</p>
<p><a href="/supermarkets/">Browse supermarkets</a></p>
"#,
        ));
        return layout(ctx, "Checkout", "checkout.html", &body);
    }

    body.push_str(
        "<h2>Items</h2>\n<table class=\"items\">\n<thead><tr><th>Product</th><th>Price</th>\
         <th>Quantity</th><th>Total</th></tr></thead>\n<tbody>\n",
    );
    for line in &summary.lines {
        body.push_str(&format!(
            "<tr><td>{}</td><td>${}</td><td>{}</td><td>${}</td></tr>\n",
            text(&line.item.product.name),
            line.item.product.price,
            line.item.quantity,
            line.total_price,
        ));
    }
    body.push_str("</tbody>\n</table>\n");

    body.push_str("<h2>By user</h2>\n");
    for group in &summary.by_user {
        body.push_str(&format!(
            "<section class=\"user-total\">\n<h3>{}</h3>\n<ul>\n",
            text(&group.username),
        ));
        for line in &group.lines {
            body.push_str(&format!(
                "<li>{} &times; {} = ${}</li>\n",
                line.item.quantity,
                text(&line.item.product.name),
                line.total_price,
            ));
        }
        body.push_str(&format!(
            "</ul>\n<p>{} items, subtotal ${}</p>\n</section>\n",
            group.quantity, group.total_price,
        ));
    }

    body.push_str(
        "<h2>By product</h2>\n<table class=\"products\">\n<thead><tr><th>Product</th>\
         <th>Unit price</th><th>Quantity</th><th>Total</th></tr></thead>\n<tbody>\n",
    );
    for row in &summary.by_product {
        body.push_str(&format!(
            "<tr><td>{}</td><td>${}</td><td>{}</td><td>${}</td></tr>\n",
            text(&row.name),
            row.unit_price,
            row.quantity,
            row.total_price,
        ));
    }
    body.push_str("</tbody>\n</table>\n");

    body.push_str(&format!(
        r#"<p class="grand-total">Total: ${total} ({quantity} items)</p>
<form method="get" action="/checkout/"><button type="submit">Checkout</button></form>
"#,
        total = summary.total_price,
        quantity = summary.total_quantity,
    ));

    layout(ctx, "Checkout", "checkout.html", &body)
}
