use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use lettre::message::Mailbox;
use rand::distributions::Alphanumeric;
use rand::Rng;

use fairsplit_common::db::{DaoError, Repository};
use fairsplit_common::email::templates::InviteMessage;
use fairsplit_common::email::{EmailMessage, EmailSender};
use fairsplit_common::models::budget::{Budget, NewBudget};
use fairsplit_common::models::budget_member::BudgetRole;
use fairsplit_common::models::income_history_entry::IncomeHistoryEntry;
use fairsplit_common::models::invite::{Invite, NewInvite};
use fairsplit_common::models::participant::{NewParticipant, Participant};
use fairsplit_common::request_io::{
    InputBudget, InputEditParticipant, InputIncomeChange, InputInvitations, InputParticipant,
    OutputBudgetMember, OutputBudgetSummary,
};
use fairsplit_common::validators;

use crate::access::{require_access, require_owner};
use crate::auth::AuthenticatedUser;
use crate::error::{db_error, ServiceError};
use crate::service::activity::ActivityRecorder;

const INVITE_TOKEN_LENGTH: usize = 32;

/// Best-effort delivery of invitation emails. Failures are logged and never
/// fail the invite operation itself.
pub struct InviteMailer {
    sender: EmailSender,
    from: Mailbox,
    reply_to: Mailbox,
    accept_url_base: String,
}

impl InviteMailer {
    pub fn new(
        sender: EmailSender,
        from: Mailbox,
        reply_to: Mailbox,
        accept_url_base: String,
    ) -> Self {
        Self {
            sender,
            from,
            reply_to,
            accept_url_base,
        }
    }

    fn send_invite(&self, budget_name: &str, inviter_name: &str, destination: &str, token: &str) {
        let accept_url = format!("{}?token={}", self.accept_url_base, token);

        let message = EmailMessage {
            body: InviteMessage::generate(budget_name, inviter_name, &accept_url),
            subject: "You have been invited to share a budget",
            from: self.from.clone(),
            reply_to: self.reply_to.clone(),
            destination,
            is_html: true,
        };

        if let Err(e) = self.sender.send(message) {
            log::error!("{e}");
        }
    }
}

pub struct BudgetService {
    repo: Arc<dyn Repository>,
    mailer: InviteMailer,
    activity: ActivityRecorder,
}

impl BudgetService {
    pub fn new(repo: Arc<dyn Repository>, mailer: InviteMailer, activity: ActivityRecorder) -> Self {
        Self {
            repo,
            mailer,
            activity,
        }
    }

    /// Creates a budget owned by the caller. No participant is seeded; the
    /// first transaction does that if the budget is still empty.
    pub fn create_budget(
        &self,
        caller: &AuthenticatedUser,
        input: &InputBudget,
    ) -> Result<Budget, ServiceError> {
        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        let new_budget = NewBudget {
            id: Uuid::now_v7(),
            name: &input.name,
            owner_user_id: caller.user_id,
            created_at: SystemTime::now(),
        };

        self.repo
            .create_budget(&new_budget)
            .map_err(|e| db_error(e, "budget"))?;

        self.activity.record(
            caller,
            "budget.create",
            "budget",
            Some(new_budget.id),
            Some(new_budget.id),
            serde_json::json!({ "name": input.name }),
        );

        self.repo
            .get_budget(new_budget.id)
            .map_err(|e| db_error(e, "budget"))
    }

    /// Budgets the caller owns plus budgets they are a member of, each
    /// tagged with the caller's role.
    pub fn list_budgets(
        &self,
        caller: &AuthenticatedUser,
    ) -> Result<Vec<OutputBudgetSummary>, ServiceError> {
        let budgets = self
            .repo
            .get_budgets_for_user(caller.user_id)
            .map_err(|e| db_error(e, "budgets"))?;

        Ok(budgets
            .into_iter()
            .map(|(budget, role)| OutputBudgetSummary::from_budget(budget, role))
            .collect())
    }

    pub fn rename_budget(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        input: &InputBudget,
    ) -> Result<(), ServiceError> {
        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.repo
            .rename_budget(budget_id, &input.name)
            .map_err(|e| db_error(e, "budget"))?;

        self.activity.record(
            caller,
            "budget.rename",
            "budget",
            Some(budget_id),
            Some(budget_id),
            serde_json::json!({ "name": input.name }),
        );

        Ok(())
    }

    pub fn delete_budget(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<(), ServiceError> {
        require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.repo
            .delete_budget(budget_id)
            .map_err(|e| db_error(e, "budget"))?;

        self.activity.record(
            caller,
            "budget.delete",
            "budget",
            Some(budget_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    /// Creates one invite per address, case-insensitively deduplicated
    /// within the batch. An address may belong to a not-yet-registered user.
    /// Each invite gets a fresh unguessable token; a notification email is
    /// sent best-effort.
    pub fn invite_users(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        input: &InputInvitations,
    ) -> Result<Vec<Invite>, ServiceError> {
        let budget = require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        let inviter = self
            .repo
            .get_user_by_id(caller.user_id)
            .map_err(|e| db_error(e, "user"))?;

        let caller_email = caller.email.to_lowercase();

        let existing_pending: HashSet<String> = self
            .repo
            .list_invites_for_budget(budget_id)
            .map_err(|e| db_error(e, "invitations"))?
            .into_iter()
            .filter(|i| !i.is_accepted())
            .map(|i| i.email.to_lowercase())
            .collect();

        let mut seen = HashSet::new();
        let mut normalized_emails = Vec::new();

        for email in &input.emails {
            if let Some(message) = validators::validate_email_address(email).into_message() {
                return Err(ServiceError::ValidationError(message));
            }

            let normalized = email.to_lowercase();

            if normalized == caller_email {
                return Err(ServiceError::InvalidOperation(String::from(
                    "Cannot invite yourself to your own budget",
                )));
            }

            if existing_pending.contains(&normalized) {
                return Err(ServiceError::Conflict(String::from(
                    "An invitation for this email is already pending",
                )));
            }

            if seen.insert(normalized.clone()) {
                normalized_emails.push(normalized);
            }
        }

        let tokens: Vec<String> = normalized_emails
            .iter()
            .map(|_| {
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(INVITE_TOKEN_LENGTH)
                    .map(char::from)
                    .collect()
            })
            .collect();

        let now = SystemTime::now();

        let new_invites: Vec<NewInvite> = normalized_emails
            .iter()
            .zip(&tokens)
            .map(|(email, token)| NewInvite {
                id: Uuid::now_v7(),
                budget_id,
                inviter_user_id: caller.user_id,
                email,
                token,
                accepted_at: None,
                accepted_user_id: None,
                created_at: now,
            })
            .collect();

        self.repo
            .create_invites(&new_invites)
            .map_err(|e| db_error(e, "invitations"))?;

        for invite in &new_invites {
            self.mailer
                .send_invite(&budget.name, &inviter.name, invite.email, invite.token);

            self.activity.record(
                caller,
                "invite.create",
                "invite",
                Some(invite.id),
                Some(budget_id),
                serde_json::json!({ "email": invite.email }),
            );
        }

        Ok(new_invites
            .iter()
            .map(|i| Invite {
                id: i.id,
                budget_id: i.budget_id,
                inviter_user_id: i.inviter_user_id,
                email: i.email.to_owned(),
                token: i.token.to_owned(),
                accepted_at: None,
                accepted_user_id: None,
                created_at: now,
            })
            .collect())
    }

    pub fn accept_invite(
        &self,
        caller: &AuthenticatedUser,
        invite_id: Uuid,
    ) -> Result<(), ServiceError> {
        let invite = self
            .repo
            .get_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        self.accept(caller, invite)
    }

    pub fn accept_invite_by_token(
        &self,
        caller: &AuthenticatedUser,
        token: &str,
    ) -> Result<(), ServiceError> {
        let invite = self
            .repo
            .get_invite_by_token(token)
            .map_err(|e| db_error(e, "invitation"))?;

        self.accept(caller, invite)
    }

    fn accept(&self, caller: &AuthenticatedUser, invite: Invite) -> Result<(), ServiceError> {
        if invite.is_accepted() {
            return Err(ServiceError::AlreadyAccepted);
        }

        if invite.email.to_lowercase() != caller.email.to_lowercase() {
            return Err(ServiceError::Forbidden(String::from(
                "Invitation is addressed to a different email",
            )));
        }

        let budget = self
            .repo
            .get_budget(invite.budget_id)
            .map_err(|e| db_error(e, "budget"))?;

        if budget.owner_user_id == caller.user_id {
            return Err(ServiceError::InvalidOperation(String::from(
                "Owner cannot accept an invitation to their own budget",
            )));
        }

        let user = self
            .repo
            .get_user_by_id(caller.user_id)
            .map_err(|e| db_error(e, "user"))?;

        let participant_email = invite.email.to_lowercase();
        let participant_if_absent = NewParticipant {
            id: Uuid::now_v7(),
            budget_id: invite.budget_id,
            user_id: Some(caller.user_id),
            income: user.default_income,
            name: &user.name,
            email: &participant_email,
        };

        match self.repo.accept_invite(
            invite.id,
            caller.user_id,
            &participant_if_absent,
            SystemTime::now(),
        ) {
            Ok(()) => (),
            Err(DaoError::AlreadyExists) => return Err(ServiceError::AlreadyAccepted),
            Err(e) => return Err(db_error(e, "invitation")),
        }

        self.activity.record(
            caller,
            "invite.accept",
            "invite",
            Some(invite.id),
            Some(invite.budget_id),
            serde_json::json!({ "email": invite.email }),
        );

        Ok(())
    }

    /// Declining deletes the invite; only the invitee may do it, and only
    /// while the invite is still pending.
    pub fn reject_invite(
        &self,
        caller: &AuthenticatedUser,
        invite_id: Uuid,
    ) -> Result<(), ServiceError> {
        let invite = self
            .repo
            .get_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        if invite.email.to_lowercase() != caller.email.to_lowercase() {
            return Err(ServiceError::Forbidden(String::from(
                "Invitation is addressed to a different email",
            )));
        }

        // An accepted invite is no longer rejectable; to the invitee it no
        // longer exists as a pending invitation
        if invite.is_accepted() {
            return Err(ServiceError::NotFound(String::from("invitation")));
        }

        self.repo
            .delete_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        self.activity.record(
            caller,
            "invite.reject",
            "invite",
            Some(invite_id),
            Some(invite.budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    pub fn revoke_invite(
        &self,
        caller: &AuthenticatedUser,
        invite_id: Uuid,
    ) -> Result<(), ServiceError> {
        let invite = self
            .repo
            .get_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        require_owner(self.repo.as_ref(), invite.budget_id, caller.user_id)?;

        if invite.is_accepted() {
            return Err(ServiceError::AlreadyAccepted);
        }

        self.repo
            .delete_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        self.activity.record(
            caller,
            "invite.revoke",
            "invite",
            Some(invite_id),
            Some(invite.budget_id),
            serde_json::json!({ "email": invite.email }),
        );

        Ok(())
    }

    /// Re-sends the invitation email and bumps the invite's timestamp. The
    /// token is intentionally NOT rotated: links from the earlier email must
    /// keep working.
    pub fn resend_invite(
        &self,
        caller: &AuthenticatedUser,
        invite_id: Uuid,
    ) -> Result<(), ServiceError> {
        let invite = self
            .repo
            .get_invite(invite_id)
            .map_err(|e| db_error(e, "invitation"))?;

        let budget = require_owner(self.repo.as_ref(), invite.budget_id, caller.user_id)?;

        if invite.is_accepted() {
            return Err(ServiceError::AlreadyAccepted);
        }

        self.repo
            .refresh_invite_timestamp(invite_id, SystemTime::now())
            .map_err(|e| db_error(e, "invitation"))?;

        let inviter = self
            .repo
            .get_user_by_id(caller.user_id)
            .map_err(|e| db_error(e, "user"))?;

        self.mailer
            .send_invite(&budget.name, &inviter.name, &invite.email, &invite.token);

        self.activity.record(
            caller,
            "invite.resend",
            "invite",
            Some(invite_id),
            Some(invite.budget_id),
            serde_json::json!({ "email": invite.email }),
        );

        Ok(())
    }

    /// All of a budget's invites, pending and accepted. Owner only.
    pub fn list_invites(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<Vec<Invite>, ServiceError> {
        require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.repo
            .list_invites_for_budget(budget_id)
            .map_err(|e| db_error(e, "invitations"))
    }

    /// Pending invites addressed to the caller's email.
    pub fn list_my_invites(
        &self,
        caller: &AuthenticatedUser,
    ) -> Result<Vec<Invite>, ServiceError> {
        self.repo
            .list_pending_invites_for_email(&caller.email)
            .map_err(|e| db_error(e, "invitations"))
    }

    /// The owner (always first) followed by accepted members.
    pub fn list_members(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<Vec<OutputBudgetMember>, ServiceError> {
        let budget = require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        let owner = self
            .repo
            .get_user_by_id(budget.owner_user_id)
            .map_err(|e| db_error(e, "user"))?;

        let mut members = vec![OutputBudgetMember {
            user_id: owner.id,
            name: owner.name,
            email: owner.email,
            role: BudgetRole::Owner,
        }];

        for member in self
            .repo
            .list_budget_members(budget_id)
            .map_err(|e| db_error(e, "budget members"))?
        {
            let user = self
                .repo
                .get_user_by_id(member.user_id)
                .map_err(|e| db_error(e, "user"))?;

            members.push(OutputBudgetMember {
                user_id: user.id,
                name: user.name,
                email: user.email,
                role: BudgetRole::Member,
            });
        }

        Ok(members)
    }

    pub fn remove_member(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let budget = require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        if budget.owner_user_id == user_id {
            return Err(ServiceError::InvalidOperation(String::from(
                "The budget owner cannot be removed",
            )));
        }

        self.repo
            .remove_member(budget_id, user_id)
            .map_err(|e| db_error(e, "budget member"))?;

        self.activity.record(
            caller,
            "member.remove",
            "budget_member",
            Some(user_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    pub fn leave_budget(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<(), ServiceError> {
        let budget = require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        if budget.owner_user_id == caller.user_id {
            return Err(ServiceError::InvalidOperation(String::from(
                "The budget owner cannot leave their own budget",
            )));
        }

        self.repo
            .remove_member(budget_id, caller.user_id)
            .map_err(|e| db_error(e, "budget member"))?;

        self.activity.record(
            caller,
            "member.leave",
            "budget_member",
            Some(caller.user_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    /// Adds a participant who bears costs without being a registered member
    /// (user link is established later if the person accepts an invite).
    pub fn add_participant(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        input: &InputParticipant,
    ) -> Result<Participant, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_email_address(&input.email).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_amount(input.income).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        let email = input.email.to_lowercase();

        let new_participant = NewParticipant {
            id: Uuid::now_v7(),
            budget_id,
            user_id: None,
            income: input.income,
            name: &input.name,
            email: &email,
        };

        match self.repo.create_participant(&new_participant) {
            Ok(()) => (),
            Err(DaoError::AlreadyExists) => {
                return Err(ServiceError::Conflict(String::from(
                    "A participant with this email already exists in the budget",
                )))
            }
            Err(e) => return Err(db_error(e, "participant")),
        }

        self.activity.record(
            caller,
            "participant.add",
            "participant",
            Some(new_participant.id),
            Some(budget_id),
            serde_json::json!({ "email": email }),
        );

        self.repo
            .get_participant(new_participant.id)
            .map_err(|e| db_error(e, "participant"))
    }

    pub fn list_participants(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<Vec<Participant>, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.repo
            .list_participants(budget_id)
            .map_err(|e| db_error(e, "participants"))
    }

    pub fn update_participant(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        participant_id: Uuid,
        input: &InputEditParticipant,
    ) -> Result<(), ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_email_address(&input.email).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        self.participant_in_budget(budget_id, participant_id)?;

        let email = input.email.to_lowercase();

        match self.repo.update_participant(participant_id, &input.name, &email) {
            Ok(()) => (),
            Err(DaoError::AlreadyExists) => {
                return Err(ServiceError::Conflict(String::from(
                    "A participant with this email already exists in the budget",
                )))
            }
            Err(e) => return Err(db_error(e, "participant")),
        }

        self.activity.record(
            caller,
            "participant.update",
            "participant",
            Some(participant_id),
            Some(budget_id),
            serde_json::json!({ "name": input.name, "email": email }),
        );

        Ok(())
    }

    /// Changes a participant's income. The new value applies from
    /// `effective_from` (default: now); earlier transactions keep being
    /// split by the income that was in force on their date.
    pub fn set_participant_income(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        participant_id: Uuid,
        input: &InputIncomeChange,
    ) -> Result<(), ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        if let Some(message) = validators::validate_amount(input.income).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        self.participant_in_budget(budget_id, participant_id)?;

        let effective_from = input.effective_from.unwrap_or_else(SystemTime::now);

        self.repo
            .set_participant_income(participant_id, input.income, effective_from)
            .map_err(|e| db_error(e, "participant"))?;

        self.activity.record(
            caller,
            "participant.set_income",
            "participant",
            Some(participant_id),
            Some(budget_id),
            serde_json::json!({ "income": input.income }),
        );

        Ok(())
    }

    pub fn remove_participant(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        participant_id: Uuid,
    ) -> Result<(), ServiceError> {
        require_owner(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.participant_in_budget(budget_id, participant_id)?;

        self.repo
            .delete_participant(participant_id)
            .map_err(|e| db_error(e, "participant"))?;

        self.activity.record(
            caller,
            "participant.remove",
            "participant",
            Some(participant_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    /// Full income history of a budget's participants, oldest first.
    pub fn list_income_history(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<Vec<IncomeHistoryEntry>, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.repo
            .list_income_history_for_budget(budget_id)
            .map_err(|e| db_error(e, "income history"))
    }

    fn participant_in_budget(
        &self,
        budget_id: Uuid,
        participant_id: Uuid,
    ) -> Result<Participant, ServiceError> {
        let participant = self
            .repo
            .get_participant(participant_id)
            .map_err(|e| db_error(e, "participant"))?;

        if participant.budget_id != budget_id {
            return Err(ServiceError::NotFound(String::from("participant")));
        }

        Ok(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use fairsplit_common::db::BudgetStore;
    use fairsplit_common::models::user::User;
    use fairsplit_common::request_io::Pagination;

    use crate::service::test_utils::{caller_for, random_email, TestContext};

    fn create_budget(ctx: &TestContext, owner: &User, name: &str) -> Budget {
        ctx.budgets
            .create_budget(
                &caller_for(owner),
                &InputBudget {
                    name: name.to_owned(),
                },
            )
            .unwrap()
    }

    fn invite(ctx: &TestContext, owner: &User, budget_id: Uuid, email: &str) -> Invite {
        ctx.budgets
            .invite_users(
                &caller_for(owner),
                budget_id,
                &InputInvitations {
                    emails: vec![email.to_owned()],
                },
            )
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_invitation_lifecycle_end_to_end() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 3000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);

        let budget = create_budget(&ctx, &owner, "Household");

        // Invite with different casing than the registered email
        let sent_invite = invite(&ctx, &owner, budget.id, &member_email.to_uppercase());
        assert_eq!(sent_invite.email, member_email);

        let sent_mail = ctx.email_sender.sent_messages();
        assert_eq!(sent_mail.len(), 1);
        assert_eq!(sent_mail[0].destination, member_email);
        assert!(sent_mail[0].body.contains(&sent_invite.token));

        let pending = ctx.budgets.list_my_invites(&caller_for(&member)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, sent_invite.id);

        ctx.budgets
            .accept_invite_by_token(&caller_for(&member), &sent_invite.token)
            .unwrap();

        // Membership granted, participant seeded with the member's default income
        let members = ctx
            .budgets
            .list_members(&caller_for(&member), budget.id)
            .unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].user_id, owner.id);
        assert_eq!(members[0].role, BudgetRole::Owner);
        assert!(members
            .iter()
            .any(|m| m.user_id == member.id && m.role == BudgetRole::Member));

        let participants = ctx
            .budgets
            .list_participants(&caller_for(&member), budget.id)
            .unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].user_id, Some(member.id));
        assert_eq!(participants[0].income, 1000.0);
        assert_eq!(participants[0].email, member_email);

        assert!(ctx
            .budgets
            .list_my_invites(&caller_for(&member))
            .unwrap()
            .is_empty());

        let summaries = ctx.budgets.list_budgets(&caller_for(&member)).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].role, BudgetRole::Member);
    }

    #[test]
    fn test_accepting_twice_fails_without_duplicates() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);

        let budget = create_budget(&ctx, &owner, "Trip");
        let sent_invite = invite(&ctx, &owner, budget.id, &member_email);

        ctx.budgets
            .accept_invite(&caller_for(&member), sent_invite.id)
            .unwrap();

        let second = ctx
            .budgets
            .accept_invite(&caller_for(&member), sent_invite.id);
        assert_eq!(second, Err(ServiceError::AlreadyAccepted));

        // No duplicate member row or participant
        assert_eq!(ctx.repo.list_budget_members(budget.id).unwrap().len(), 1);
        assert_eq!(ctx.repo.list_participants(budget.id).unwrap().len(), 1);
    }

    #[test]
    fn test_accept_requires_matching_email() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let intruder = ctx.register_user(&random_email(), 1000.0);

        let budget = create_budget(&ctx, &owner, "Trip");
        let sent_invite = invite(&ctx, &owner, budget.id, &random_email());

        let result = ctx
            .budgets
            .accept_invite(&caller_for(&intruder), sent_invite.id);
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn test_reject_deletes_pending_invite_only() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);

        let budget = create_budget(&ctx, &owner, "Trip");

        let rejected_invite = invite(&ctx, &owner, budget.id, &member_email);
        ctx.budgets
            .reject_invite(&caller_for(&member), rejected_invite.id)
            .unwrap();
        assert!(matches!(
            ctx.repo.get_invite(rejected_invite.id),
            Err(DaoError::NotFound)
        ));

        // A new invite can be accepted after rejection of the first
        let second_invite = invite(&ctx, &owner, budget.id, &member_email);
        ctx.budgets
            .accept_invite(&caller_for(&member), second_invite.id)
            .unwrap();

        let rejection_after_accept = ctx
            .budgets
            .reject_invite(&caller_for(&member), second_invite.id);
        assert!(matches!(
            rejection_after_accept,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_revoke_is_owner_only_and_pending_only() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);
        let outsider = ctx.register_user(&random_email(), 1000.0);

        let budget = create_budget(&ctx, &owner, "Trip");
        let first_invite = invite(&ctx, &owner, budget.id, &member_email);

        let by_outsider = ctx
            .budgets
            .revoke_invite(&caller_for(&outsider), first_invite.id);
        assert!(matches!(by_outsider, Err(ServiceError::Forbidden(_))));

        ctx.budgets
            .revoke_invite(&caller_for(&owner), first_invite.id)
            .unwrap();
        assert!(ctx
            .budgets
            .list_my_invites(&caller_for(&member))
            .unwrap()
            .is_empty());

        let second_invite = invite(&ctx, &owner, budget.id, &member_email);
        ctx.budgets
            .accept_invite(&caller_for(&member), second_invite.id)
            .unwrap();

        let revoke_accepted = ctx
            .budgets
            .revoke_invite(&caller_for(&owner), second_invite.id);
        assert_eq!(revoke_accepted, Err(ServiceError::AlreadyAccepted));
    }

    #[test]
    fn test_resend_bumps_timestamp_but_keeps_token() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let invitee_email = random_email();

        let budget = create_budget(&ctx, &owner, "Trip");
        let sent_invite = invite(&ctx, &owner, budget.id, &invitee_email);

        ctx.budgets
            .resend_invite(&caller_for(&owner), sent_invite.id)
            .unwrap();

        let refreshed = ctx.repo.get_invite(sent_invite.id).unwrap();
        assert_eq!(refreshed.token, sent_invite.token);
        assert!(refreshed.created_at >= sent_invite.created_at);

        let sent_mail = ctx.email_sender.sent_messages();
        assert_eq!(sent_mail.len(), 2);
        assert!(sent_mail[1].body.contains(&sent_invite.token));

        let page = ctx
            .activity
            .list(
                &caller_for(&owner),
                Pagination {
                    page: 1,
                    page_size: 20,
                },
            )
            .unwrap();
        assert!(page
            .items
            .iter()
            .any(|e| e.action == "invite.resend" && e.entity_id == Some(sent_invite.id)));
    }

    #[test]
    fn test_update_participant_rejects_taken_email_and_records_activity() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let caller = caller_for(&owner);
        let budget = create_budget(&ctx, &owner, "Household");

        let first_email = random_email();
        ctx.budgets
            .add_participant(
                &caller,
                budget.id,
                &InputParticipant {
                    name: String::from("First"),
                    email: first_email.clone(),
                    income: 1000.0,
                },
            )
            .unwrap();

        let second = ctx
            .budgets
            .add_participant(
                &caller,
                budget.id,
                &InputParticipant {
                    name: String::from("Second"),
                    email: random_email(),
                    income: 1000.0,
                },
            )
            .unwrap();

        // Case-variant of a taken email is still a duplicate
        let renamed_onto_taken_email = ctx.budgets.update_participant(
            &caller,
            budget.id,
            second.id,
            &InputEditParticipant {
                name: String::from("Second"),
                email: first_email.to_uppercase(),
            },
        );
        assert!(matches!(
            renamed_onto_taken_email,
            Err(ServiceError::Conflict(_))
        ));

        let participants = ctx.budgets.list_participants(&caller, budget.id).unwrap();
        assert_eq!(
            participants
                .iter()
                .filter(|p| p.email == first_email)
                .count(),
            1
        );

        let fresh_email = random_email();
        ctx.budgets
            .update_participant(
                &caller,
                budget.id,
                second.id,
                &InputEditParticipant {
                    name: String::from("Renamed"),
                    email: fresh_email.clone(),
                },
            )
            .unwrap();

        let updated = ctx.repo.get_participant(second.id).unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, fresh_email);

        let page = ctx
            .activity
            .list(
                &caller,
                Pagination {
                    page: 1,
                    page_size: 20,
                },
            )
            .unwrap();
        assert!(page
            .items
            .iter()
            .any(|e| e.action == "participant.update" && e.entity_id == Some(second.id)));
    }

    #[test]
    fn test_invite_batch_dedup_and_conflicts() {
        let ctx = TestContext::new();

        let owner_email = random_email();
        let owner = ctx.register_user(&owner_email, 2000.0);
        let budget = create_budget(&ctx, &owner, "Trip");

        let invitee_email = random_email();

        // Case-variants of one address collapse to a single invite
        let created = ctx
            .budgets
            .invite_users(
                &caller_for(&owner),
                budget.id,
                &InputInvitations {
                    emails: vec![invitee_email.clone(), invitee_email.to_uppercase()],
                },
            )
            .unwrap();
        assert_eq!(created.len(), 1);

        let duplicate = ctx.budgets.invite_users(
            &caller_for(&owner),
            budget.id,
            &InputInvitations {
                emails: vec![invitee_email],
            },
        );
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

        let self_invite = ctx.budgets.invite_users(
            &caller_for(&owner),
            budget.id,
            &InputInvitations {
                emails: vec![owner_email],
            },
        );
        assert!(matches!(self_invite, Err(ServiceError::InvalidOperation(_))));
    }

    #[test]
    fn test_only_owner_may_invite() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);

        let budget = create_budget(&ctx, &owner, "Trip");
        let sent_invite = invite(&ctx, &owner, budget.id, &member_email);
        ctx.budgets
            .accept_invite(&caller_for(&member), sent_invite.id)
            .unwrap();

        let by_member = ctx.budgets.invite_users(
            &caller_for(&member),
            budget.id,
            &InputInvitations {
                emails: vec![random_email()],
            },
        );
        assert!(matches!(by_member, Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn test_owner_is_never_a_member_row_and_can_never_leave() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Trip");

        assert!(ctx.repo.list_budget_members(budget.id).unwrap().is_empty());

        let leave = ctx.budgets.leave_budget(&caller_for(&owner), budget.id);
        assert!(matches!(leave, Err(ServiceError::InvalidOperation(_))));

        let remove_self = ctx
            .budgets
            .remove_member(&caller_for(&owner), budget.id, owner.id);
        assert!(matches!(remove_self, Err(ServiceError::InvalidOperation(_))));
    }

    #[test]
    fn test_remove_member_and_leave_drop_membership_and_participant() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let first_email = random_email();
        let first = ctx.register_user(&first_email, 1000.0);
        let second_email = random_email();
        let second = ctx.register_user(&second_email, 1500.0);

        let budget = create_budget(&ctx, &owner, "Flat");

        for (user, email) in [(&first, &first_email), (&second, &second_email)] {
            let i = invite(&ctx, &owner, budget.id, email);
            ctx.budgets.accept_invite(&caller_for(user), i.id).unwrap();
        }

        // A member cannot remove another member
        let by_member = ctx
            .budgets
            .remove_member(&caller_for(&first), budget.id, second.id);
        assert!(matches!(by_member, Err(ServiceError::Forbidden(_))));

        ctx.budgets
            .remove_member(&caller_for(&owner), budget.id, first.id)
            .unwrap();
        ctx.budgets
            .leave_budget(&caller_for(&second), budget.id)
            .unwrap();

        assert!(ctx.repo.list_budget_members(budget.id).unwrap().is_empty());
        assert!(ctx.repo.list_participants(budget.id).unwrap().is_empty());

        let access_after_removal = ctx
            .budgets
            .list_participants(&caller_for(&first), budget.id);
        assert!(matches!(access_after_removal, Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn test_participant_management() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let caller = caller_for(&owner);

        let participant = ctx
            .budgets
            .add_participant(
                &caller,
                budget.id,
                &InputParticipant {
                    name: String::from("Roommate"),
                    email: random_email(),
                    income: 1200.0,
                },
            )
            .unwrap();
        assert_eq!(participant.user_id, None);

        // Adding a participant does not write an income history entry
        assert!(ctx
            .budgets
            .list_income_history(&caller, budget.id)
            .unwrap()
            .is_empty());

        ctx.budgets
            .set_participant_income(
                &caller,
                budget.id,
                participant.id,
                &InputIncomeChange {
                    income: 1600.0,
                    effective_from: None,
                },
            )
            .unwrap();

        let history = ctx.budgets.list_income_history(&caller, budget.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].income, 1600.0);

        ctx.budgets
            .update_participant(
                &caller,
                budget.id,
                participant.id,
                &InputEditParticipant {
                    name: String::from("Renamed"),
                    email: random_email(),
                },
            )
            .unwrap();

        ctx.budgets
            .remove_participant(&caller, budget.id, participant.id)
            .unwrap();
        assert!(ctx
            .budgets
            .list_participants(&caller, budget.id)
            .unwrap()
            .is_empty());

        // Mismatched budget/participant pair reads as missing
        let other_budget = create_budget(&ctx, &owner, "Other");
        let p2 = ctx
            .budgets
            .add_participant(
                &caller,
                other_budget.id,
                &InputParticipant {
                    name: String::from("Elsewhere"),
                    email: random_email(),
                    income: 900.0,
                },
            )
            .unwrap();
        let cross_budget = ctx.budgets.remove_participant(&caller, budget.id, p2.id);
        assert!(matches!(cross_budget, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_delete_budget_requires_owner_and_cascades() {
        let ctx = TestContext::new();

        let owner = ctx.register_user(&random_email(), 2000.0);
        let member_email = random_email();
        let member = ctx.register_user(&member_email, 1000.0);

        let budget = create_budget(&ctx, &owner, "Doomed");
        let sent_invite = invite(&ctx, &owner, budget.id, &member_email);
        ctx.budgets
            .accept_invite(&caller_for(&member), sent_invite.id)
            .unwrap();

        let by_member = ctx.budgets.delete_budget(&caller_for(&member), budget.id);
        assert!(matches!(by_member, Err(ServiceError::Forbidden(_))));

        ctx.budgets
            .delete_budget(&caller_for(&owner), budget.id)
            .unwrap();

        assert!(ctx.budgets.list_budgets(&caller_for(&member)).unwrap().is_empty());
        assert!(matches!(
            ctx.repo.get_budget(budget.id),
            Err(DaoError::NotFound)
        ));
    }
}
