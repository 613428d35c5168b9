//! Ownership checks applied after a record has been loaded.
//!
//! Handlers load the record first, so a missing record answers 404 and an
//! existing record the actor may not touch answers 403.

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Case, CaseFile, Note};

/// A record that remembers which user created it.
pub trait Owned {
    fn owner_id(&self) -> Option<i32>;
}

impl Owned for Case {
    fn owner_id(&self) -> Option<i32> {
        self.creator_id
    }
}

impl Owned for Note {
    fn owner_id(&self) -> Option<i32> {
        self.creator_id
    }
}

/// A stored file is owned through the case it is attached to.
pub struct AttachedFile<'a> {
    pub file: &'a CaseFile,
    pub case: &'a Case,
}

impl Owned for AttachedFile<'_> {
    fn owner_id(&self) -> Option<i32> {
        debug_assert_eq!(self.file.case_id, self.case.id);
        self.case.creator_id
    }
}

pub fn can_access(actor: &AuthenticatedUser, owner: Option<i32>) -> bool {
    actor.is_admin || owner == Some(actor.user_id)
}

pub fn ensure_can_access<R: Owned + ?Sized>(actor: &AuthenticatedUser, record: &R) -> AppResult<()> {
    if can_access(actor, record.owner_id()) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// Nobody may deactivate or delete their own account, admins included.
pub fn ensure_not_self(actor: &AuthenticatedUser, target_user_id: i32) -> AppResult<()> {
    if actor.user_id == target_user_id {
        return Err(AppError::forbidden_with(
            "you cannot modify your own account",
        ));
    }
    Ok(())
}
