//! Write access to owned resources.
//!
//! Reads only need an authenticated caller (the `AuthUser` extractor); updates
//! and deletes also need the caller to own the resource or be staff. A refused
//! write is `PermissionDenied`, never `NotFound`: the resource stays readable.

use uuid::Uuid;

use crate::{
    accounts::repo::AccountRepo,
    error::{AppError, AppResult},
    store::Store,
};

pub fn can_modify(actor: Uuid, actor_is_staff: bool, owner: Uuid) -> bool {
    actor == owner || actor_is_staff
}

/// Only looks the actor up when they are not the owner.
pub async fn ensure_can_modify(store: &dyn Store, actor: Uuid, owner: Uuid) -> AppResult<()> {
    if actor == owner {
        return Ok(());
    }
    let is_staff = store
        .find_user(actor)
        .await?
        .is_some_and(|u| u.is_staff);
    if can_modify(actor, is_staff, owner) {
        Ok(())
    } else {
        tracing::warn!(%actor, %owner, "write refused for non-owner");
        Err(AppError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accounts::repo_types::NewUser, store::MemoryStore};

    #[test]
    fn owner_or_staff() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(can_modify(a, false, a));
        assert!(!can_modify(a, false, b));
        assert!(can_modify(a, true, b));
    }

    #[tokio::test]
    async fn staff_flag_is_read_from_the_store() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for name in ["owner", "admin"] {
            let user = store
                .create_user(NewUser {
                    username: name.into(),
                    email: format!("{name}@example.com"),
                    password_hash: "x".into(),
                    bio: String::new(),
                })
                .await
                .unwrap()
                .unwrap();
            ids.push(user.id);
        }
        let (owner, admin) = (ids[0], ids[1]);

        assert!(matches!(
            ensure_can_modify(&store, admin, owner).await,
            Err(AppError::PermissionDenied)
        ));
        store.set_staff(admin, true).await;
        assert!(ensure_can_modify(&store, admin, owner).await.is_ok());
        assert!(ensure_can_modify(&store, owner, owner).await.is_ok());
    }
}
