use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use chrono::{DateTime, Utc};

use crate::error::BankError;

pub const DEFAULT_PRODUCT_IMAGE: &str = "images/products/AlmondMilk.jpeg";
pub const DEFAULT_HEALTH_SCORE: i64 = 50;

/// Price column bounds, six digits with two after the point.
const MAX_DIGITS: usize = 6;
const DECIMAL_PLACES: usize = 2;

/// An amount of money in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * i64::from(quantity))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl FromStr for Money {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BankError::InvalidMoney(s.to_string());
        let trimmed = s.trim();

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || fraction.len() > DECIMAL_PLACES
        {
            return Err(invalid());
        }

        let whole = whole.trim_start_matches('0');
        if whole.len() > MAX_DIGITS - DECIMAL_PLACES {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;

        Ok(Self(whole * 100 + fraction))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub address: String,
}

impl Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supermarket {
    pub id: i64,
    pub name: String,
    pub location: String,
}

impl Display for Supermarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub category: String,
    pub calories: i64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub is_healthy: bool,
    pub health_score: i64,
    pub image: String,
    pub supermarket_id: i64,
}

impl Product {
    /// Image path used when a product is saved without one.
    pub fn image_for(name: &str) -> String {
        let compact: String = name.split_whitespace().collect();
        format!("images/products/{compact}.jpeg")
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Insertable product. `Default` carries the column defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub category: String,
    pub calories: i64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub is_healthy: bool,
    pub health_score: i64,
    pub image: String,
    pub supermarket_id: i64,
}

impl Default for NewProduct {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: Money::ZERO,
            category: String::new(),
            calories: 0,
            protein: 0.0,
            carbohydrates: 0.0,
            fat: 0.0,
            is_healthy: false,
            health_score: DEFAULT_HEALTH_SCORE,
            image: DEFAULT_PRODUCT_IMAGE.to_string(),
            supermarket_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: i64,
    pub name: String,
}

impl Display for Cart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared Cart {}", self.id)
    }
}

/// The user who put an item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Contributor {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product: Product,
    pub quantity: u32,
    pub added_by: Option<Contributor>,
}

impl CartItem {
    pub fn total_price(&self) -> Money {
        self.product.price.times(self.quantity)
    }
}

impl Display for CartItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.quantity, self.product.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse() {
        assert_eq!("10.99".parse::<Money>().unwrap(), Money::from_cents(1099));
        assert_eq!("5.5".parse::<Money>().unwrap(), Money::from_cents(550));
        assert_eq!("7".parse::<Money>().unwrap(), Money::from_cents(700));
        assert_eq!(".25".parse::<Money>().unwrap(), Money::from_cents(25));
        assert_eq!(" 0012.00 ".parse::<Money>().unwrap(), Money::from_cents(1200));
    }

    #[test]
    fn test_money_parse_rejects() {
        for input in ["", ".", "abc", "1.234", "-1.00", "10000.00", "1,50"] {
            assert!(input.parse::<Money>().is_err(), "accepted {input:?}");
        }
        assert!("9999.99".parse::<Money>().is_ok());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(2198).to_string(), "21.98");
        assert_eq!(Money::from_cents(1650).to_string(), "16.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-150).to_string(), "-1.50");
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::from_cents(1099);
        assert_eq!(price.times(2), Money::from_cents(2198));
        assert_eq!(price.times(0), Money::ZERO);

        let total: Money = [Money::from_cents(2198), Money::from_cents(1650)]
            .into_iter()
            .sum();
        assert_eq!(total.to_string(), "38.48");
    }

    #[test]
    fn test_image_for() {
        assert_eq!(
            Product::image_for("Almond Milk"),
            "images/products/AlmondMilk.jpeg"
        );
        assert_eq!(
            Product::image_for("  Greek  Yogurt\tPlain "),
            "images/products/GreekYogurtPlain.jpeg"
        );
    }

    #[test]
    fn test_display() {
        let cart = Cart {
            id: 3,
            name: "Shared Cart".to_string(),
        };
        assert_eq!(cart.to_string(), "Shared Cart 3");

        let supermarket = Supermarket {
            id: 1,
            name: "Test Supermarket".to_string(),
            location: "Test Location".to_string(),
        };
        assert_eq!(supermarket.to_string(), "Test Supermarket");

        let profile = Profile {
            id: 1,
            user_id: 1,
            username: "testuser".to_string(),
            address: "123 Test St".to_string(),
        };
        assert_eq!(profile.to_string(), "testuser");
    }

    #[test]
    fn test_new_product_defaults() {
        let product = NewProduct::default();
        assert_eq!(product.calories, 0);
        assert!(!product.is_healthy);
        assert_eq!(product.health_score, 50);
        assert_eq!(product.image, DEFAULT_PRODUCT_IMAGE);
    }
}
