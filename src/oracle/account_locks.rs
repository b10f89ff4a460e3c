use std::sync::Arc;
use dashmap::DashMap;
use ethers::types::Address;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 계정별 nonce 조회 ~ 브로드캐스트 구간 직렬화
///
/// 같은 서명 계정을 쓰는 제출기끼리 하나의 인스턴스를 공유해야 합니다.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 계정 잠금 획득. 가드가 drop 될 때 해제됨
    pub async fn acquire(&self, account: Address) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_same_account_is_serialized() {
        let locks = Arc::new(AccountLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let account = Address::from_low_u64_be(1);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(account).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire(Address::from_low_u64_be(1)).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(Address::from_low_u64_be(2)),
        )
        .await
        .expect("other account must not wait");
        assert_eq!(locks.len(), 2);
    }
}
