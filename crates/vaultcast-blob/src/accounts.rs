//! Static account configuration.
//!
//! Accounts are never stored in the database — only `account_id` is, as a
//! foreign key into this in-memory list loaded once at startup.

use serde::Deserialize;
use vaultcast_common::AccountId;

/// One credentialed identity on the external attachment-hosting platform.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub id: AccountId,
    /// Bearer credential presented on every request for this account.
    pub credential: String,
    /// Upload destination (channel/folder) on the external platform.
    pub destination_id: String,
}

/// The ordered, fixed-at-startup account list: `accounts[(H(video_id) + i) mod K]`.
#[derive(Debug, Clone, Default)]
pub struct AccountList {
    accounts: Vec<AccountConfig>,
}

impl AccountList {
    pub fn new(accounts: Vec<AccountConfig>) -> Self {
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountConfig> {
        self.accounts.iter()
    }

    /// Look up an account's static config by id. `None` means the id isn't
    /// configured, which callers surface as `ACCOUNT_UNAVAILABLE`.
    pub fn get(&self, id: &AccountId) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| &a.id == id)
    }

    /// Pick the account for the *i*-th segment of `video_id`, per the
    /// `(H(video_id) + i) mod K` assignment rule.
    pub fn assign(&self, video_id_hash: u64, i: u64) -> Option<&AccountConfig> {
        if self.accounts.is_empty() {
            return None;
        }
        let k = self.accounts.len() as u64;
        let idx = (video_id_hash.wrapping_add(i)) % k;
        self.accounts.get(idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountConfig {
        AccountConfig {
            id: AccountId::from(id),
            credential: "tok".into(),
            destination_id: "dest".into(),
        }
    }

    #[test]
    fn assign_is_a_pure_function_of_hash_and_offset() {
        let list = AccountList::new(vec![acct("a"), acct("b"), acct("c")]);
        let first = list.assign(7, 0).unwrap().id.clone();
        let second = list.assign(7, 0).unwrap().id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn assign_sweeps_across_accounts_with_offset() {
        let list = AccountList::new(vec![acct("a"), acct("b"), acct("c")]);
        let assigned: Vec<String> = (0..3)
            .map(|i| list.assign(0, i).unwrap().id.as_str().to_string())
            .collect();
        assert_eq!(assigned, vec!["a", "b", "c"]);
    }

    #[test]
    fn assign_on_empty_list_returns_none() {
        let list = AccountList::new(vec![]);
        assert!(list.assign(0, 0).is_none());
    }
}
