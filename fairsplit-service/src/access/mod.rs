use uuid::Uuid;

use fairsplit_common::db::{DaoError, Repository};
use fairsplit_common::models::budget::Budget;

use crate::error::{db_error, ServiceError};

/// Every budget-scoped operation goes through one of the `require_*`
/// functions before touching any data. A budget that does not exist is
/// `NotFound`; a budget the caller cannot reach is `Forbidden`, never
/// `NotFound`, so existence is not hidden from authenticated non-members.
pub fn require_access(
    repo: &dyn Repository,
    budget_id: Uuid,
    user_id: Uuid,
) -> Result<Budget, ServiceError> {
    let budget = match repo.get_budget(budget_id) {
        Ok(b) => b,
        Err(DaoError::NotFound) => return Err(ServiceError::NotFound(String::from("budget"))),
        Err(e) => return Err(db_error(e, "budget")),
    };

    if budget.owner_user_id == user_id {
        return Ok(budget);
    }

    let is_member = repo
        .is_budget_member(budget_id, user_id)
        .map_err(|e| db_error(e, "budget membership"))?;

    if is_member {
        Ok(budget)
    } else {
        Err(ServiceError::Forbidden(String::from(
            "User does not have access to this budget",
        )))
    }
}

pub fn require_owner(
    repo: &dyn Repository,
    budget_id: Uuid,
    user_id: Uuid,
) -> Result<Budget, ServiceError> {
    let budget = require_access(repo, budget_id, user_id)?;

    if budget.owner_user_id == user_id {
        Ok(budget)
    } else {
        Err(ServiceError::Forbidden(String::from(
            "Only the budget owner may perform this operation",
        )))
    }
}

pub fn has_access(
    repo: &dyn Repository,
    budget_id: Uuid,
    user_id: Uuid,
) -> Result<bool, ServiceError> {
    match require_access(repo, budget_id, user_id) {
        Ok(_) => Ok(true),
        Err(ServiceError::Forbidden(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn is_owner(
    repo: &dyn Repository,
    budget_id: Uuid,
    user_id: Uuid,
) -> Result<bool, ServiceError> {
    let budget = repo
        .get_budget(budget_id)
        .map_err(|e| db_error(e, "budget"))?;

    Ok(budget.owner_user_id == user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::SystemTime;

    use fairsplit_common::db::memory::MemoryRepository;
    use fairsplit_common::db::BudgetStore;
    use fairsplit_common::models::budget::NewBudget;
    use fairsplit_common::models::budget_member::{BudgetRole, NewBudgetMember};

    fn seed_budget(repo: &MemoryRepository, owner_user_id: Uuid) -> Uuid {
        let budget_id = Uuid::now_v7();

        repo.create_budget(&NewBudget {
            id: budget_id,
            name: "Trip",
            owner_user_id,
            created_at: SystemTime::now(),
        })
        .unwrap();

        budget_id
    }

    #[test]
    fn test_nonexistent_budget_is_not_found() {
        let repo = MemoryRepository::new();

        let result = require_access(&repo, Uuid::now_v7(), Uuid::now_v7());
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_non_member_is_forbidden_not_not_found() {
        let repo = MemoryRepository::new();
        let budget_id = seed_budget(&repo, Uuid::now_v7());

        let outsider_id = Uuid::now_v7();
        let result = require_access(&repo, budget_id, outsider_id);
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
        assert!(!has_access(&repo, budget_id, outsider_id).unwrap());
    }

    #[test]
    fn test_owner_and_member_have_access_but_only_owner_passes_require_owner() {
        let repo = MemoryRepository::new();
        let owner_id = Uuid::now_v7();
        let member_id = Uuid::now_v7();
        let budget_id = seed_budget(&repo, owner_id);

        repo.add_budget_member(&NewBudgetMember {
            budget_id,
            user_id: member_id,
            role: BudgetRole::Member.as_i16(),
            created_at: SystemTime::now(),
        })
        .unwrap();

        assert!(require_access(&repo, budget_id, owner_id).is_ok());
        assert!(require_access(&repo, budget_id, member_id).is_ok());

        assert!(require_owner(&repo, budget_id, owner_id).is_ok());
        assert!(matches!(
            require_owner(&repo, budget_id, member_id),
            Err(ServiceError::Forbidden(_))
        ));

        assert!(is_owner(&repo, budget_id, owner_id).unwrap());
        assert!(!is_owner(&repo, budget_id, member_id).unwrap());
    }
}
