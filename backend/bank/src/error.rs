use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Item does not belong to this cart")]
    NotPermitted,

    #[error("Quantity must be at least {min}")]
    InvalidQuantity { min: u32 },

    #[error("Quantity must be at most {max}")]
    QuantityTooLarge { max: u32 },

    #[error("Invalid amount: {0}")]
    InvalidMoney(String),
}

pub type Result<T> = std::result::Result<T, BankError>;
