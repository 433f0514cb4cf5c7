use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait WalletRepo: Send + Sync {
    async fn balance(&self, user_id: Uuid) -> AppResult<Option<i64>>;
    /// Single-statement conditional debit
    /// (`… SET wallet_balance_cents = wallet_balance_cents - $2
    /// WHERE id = $1 AND wallet_balance_cents >= $2`). Returns the new
    /// balance, or `None` when the user is missing or short.
    async fn debit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>>;
    async fn credit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct WalletUseCases {
    wallets: Arc<dyn WalletRepo>,
}

impl WalletUseCases {
    pub fn new(wallets: Arc<dyn WalletRepo>) -> Self {
        Self { wallets }
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<i64> {
        self.wallets
            .balance(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Withdraw from the wallet. The conditional debit is the whole
    /// concurrency story: two racing withdrawals can never overdraw.
    pub async fn withdraw(&self, user_id: Uuid, amount_cents: i64) -> AppResult<i64> {
        if amount_cents <= 0 {
            return Err(AppError::Validation("amount must be positive".into()));
        }
        match self.wallets.debit(user_id, amount_cents).await? {
            Some(new_balance) => {
                tracing::info!(
                    user_id = %user_id,
                    amount_cents,
                    new_balance_cents = new_balance,
                    "Wallet withdrawal"
                );
                Ok(new_balance)
            }
            None => match self.wallets.balance(user_id).await? {
                None => Err(AppError::NotFound),
                Some(_) => Err(AppError::Validation("insufficient wallet balance".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mocks::InMemoryWalletRepo;

    fn use_cases(repo: Arc<InMemoryWalletRepo>) -> WalletUseCases {
        WalletUseCases::new(repo)
    }

    #[tokio::test]
    async fn withdrawal_debits_the_balance() {
        let repo = Arc::new(InMemoryWalletRepo::new());
        let user_id = Uuid::new_v4();
        repo.set_balance(user_id, 10_000);

        let remaining = use_cases(repo).withdraw(user_id, 4_000).await.unwrap();
        assert_eq!(remaining, 6_000);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_and_balance_unchanged() {
        let repo = Arc::new(InMemoryWalletRepo::new());
        let user_id = Uuid::new_v4();
        repo.set_balance(user_id, 1_000);

        let uc = use_cases(repo.clone());
        let err = uc.withdraw(user_id, 2_000).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(uc.balance(user_id).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn racing_withdrawals_never_overdraw() {
        let repo = Arc::new(InMemoryWalletRepo::new());
        let user_id = Uuid::new_v4();
        repo.set_balance(user_id, 5_000);

        let uc = Arc::new(use_cases(repo.clone()));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let uc = uc.clone();
            handles.push(tokio::spawn(
                async move { uc.withdraw(user_id, 1_000).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);
        assert_eq!(uc.balance(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let repo = Arc::new(InMemoryWalletRepo::new());
        let err = use_cases(repo)
            .withdraw(Uuid::new_v4(), 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
