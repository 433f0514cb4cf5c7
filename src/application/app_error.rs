use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Voucher already redeemed")]
    AlreadyRedeemed,

    #[error("Redemption code expired")]
    CodeExpired,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidInput,
    NotFound,
    Conflict,
    AlreadyRedeemed,
    CodeExpired,
    GatewayError,
    PaymentDeclined,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::AlreadyRedeemed => "ALREADY_REDEEMED",
            ErrorCode::CodeExpired => "CODE_EXPIRED",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::PaymentDeclined => "PAYMENT_DECLINED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
