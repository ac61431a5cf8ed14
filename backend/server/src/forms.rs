use std::sync::LazyLock;

use bank::{carts::MAX_QUANTITY, rusqlite::Connection, users};
use regex::Regex;
use serde::Deserialize;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const ADDRESS_MAX_LENGTH: usize = 150;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, \
     numbers, and @/./+/-/_ characters.";
pub const EMAIL_TAKEN: &str = "Email is already in use.";
pub const USERNAME_TAKEN: &str = "Username is already taken.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both \
     fields may be case-sensitive.";

static EMAIL_LOCAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-!#$%&'*+/=?^_`{}|~0-9A-Za-z]+(\.[-!#$%&'*+/=?^_`{}|~0-9A-Za-z]+)*$").unwrap()
});

static EMAIL_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$").unwrap()
});

static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// Field errors in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<(&'static str, String)>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn has(&self, field: &str) -> bool {
        self.field(field).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn clean_char_field(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    max_length: Option<usize>,
) -> String {
    let value = raw.trim().to_string();

    if value.is_empty() {
        errors.add(field, REQUIRED);
        return value;
    }

    if let Some(max) = max_length {
        let length = value.chars().count();
        if length > max {
            errors.add(
                field,
                format!("Ensure this value has at most {max} characters (it has {length})."),
            );
        }
    }

    value
}

/// Lowercases the domain part, keeping the local part as typed.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    EMAIL_LOCAL.is_match(local) && EMAIL_DOMAIN.is_match(domain)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupStep1 {
    #[serde(default)]
    pub email: String,
}

impl SignupStep1 {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let email = clean_char_field(&mut errors, "email", &self.email, Some(EMAIL_MAX_LENGTH));

        if errors.is_empty() && !is_valid_email(&email) {
            errors.add("email", INVALID_EMAIL);
        }

        errors.into_result(normalize_email(&email))
    }

    pub fn validate(&self, conn: &Connection) -> bank::Result<Result<String, FormErrors>> {
        let email = match self.clean() {
            Ok(email) => email,
            Err(errors) => return Ok(Err(errors)),
        };

        if users::email_exists(conn, &email)? {
            let mut errors = FormErrors::default();
            errors.add("email", EMAIL_TAKEN);
            return Ok(Err(errors));
        }

        Ok(Ok(email))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupStep2 {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub address: String,
}

impl SignupStep2 {
    pub fn clean(&self) -> Result<Registration, FormErrors> {
        let mut errors = FormErrors::default();

        let username = clean_char_field(
            &mut errors,
            "username",
            &self.username,
            Some(USERNAME_MAX_LENGTH),
        );
        if !errors.has("username") && !USERNAME.is_match(&username) {
            errors.add("username", INVALID_USERNAME);
        }

        let password = clean_char_field(&mut errors, "password", &self.password, None);
        let address = clean_char_field(
            &mut errors,
            "address",
            &self.address,
            Some(ADDRESS_MAX_LENGTH),
        );

        errors.into_result(Registration {
            username,
            password,
            address,
        })
    }

    pub fn validate(&self, conn: &Connection) -> bank::Result<Result<Registration, FormErrors>> {
        let mut errors = FormErrors::default();

        let registration = match self.clean() {
            Ok(registration) => Some(registration),
            Err(field_errors) => {
                errors = field_errors;
                None
            }
        };

        let username = self.username.trim();
        if !errors.has("username") && users::username_exists(conn, username)? {
            errors.add("username", USERNAME_TAKEN);
        }

        match registration {
            Some(registration) if errors.is_empty() => Ok(Ok(registration)),
            _ => Ok(Err(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::default();
        let username = clean_char_field(&mut errors, "username", &self.username, None);
        let password = clean_char_field(&mut errors, "password", &self.password, None);

        errors.into_result((username, password))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuantityForm {
    #[serde(default)]
    pub quantity: Option<String>,
}

impl QuantityForm {
    /// Parses the quantity, falling back to `default` when the field is
    /// missing or blank.
    pub fn quantity(&self, default: Option<u32>) -> Result<u32, String> {
        let raw = self.quantity.as_deref().map(str::trim).unwrap_or("");

        if raw.is_empty() {
            return default.ok_or_else(|| "Quantity is required.".to_string());
        }

        let quantity = raw
            .parse::<u32>()
            .map_err(|_| format!("{raw:?} is not a valid quantity."))?;

        if quantity > MAX_QUANTITY {
            return Err(format!("Quantity must be at most {MAX_QUANTITY}."));
        }

        Ok(quantity)
    }
}
