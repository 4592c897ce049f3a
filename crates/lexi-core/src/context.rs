//! The document a user last demystified, used to ground chat answers.
//!
//! Keyed by user id and kept in memory only: losing it on restart just
//! sends the next chat question down the general prompt.

use std::collections::HashMap;

use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct DocumentContextStore {
    documents: RwLock<HashMap<String, String>>,
}

impl DocumentContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `user`'s document context.
    pub async fn set(&self, user: &str, text: impl Into<String>) {
        self.documents.write().await.insert(user.to_owned(), text.into());
    }

    pub async fn get(&self, user: &str) -> Option<String> {
        self.documents.read().await.get(user).cloned()
    }

    /// Forget `user`'s context. Returns whether there was one.
    pub async fn clear(&self, user: &str) -> bool {
        self.documents.write().await.remove(user).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn context_is_per_user() {
        let store = DocumentContextStore::new();
        store.set("asha", "Lease A").await;
        store.set("ravi", "Lease B").await;
        store.set("asha", "Lease C").await;

        assert_eq!(store.get("asha").await.as_deref(), Some("Lease C"));
        assert_eq!(store.get("ravi").await.as_deref(), Some("Lease B"));
        assert!(store.clear("asha").await);
        assert!(!store.clear("asha").await);
        assert!(store.get("asha").await.is_none());
    }
}
