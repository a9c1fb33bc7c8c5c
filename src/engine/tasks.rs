// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Task reward engine.

use super::Engine;
use crate::LedgerError;
use crate::base::{AccountId, TaskTemplateId, TransactionId};
use crate::roles::Role;
use crate::task::{TaskState, TaskTemplate, TaskView, UserTaskStatus};
use crate::transaction::{EntryKind, Posting};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCompletion {
    pub template: TaskTemplateId,
    pub reward: Decimal,
    pub transaction: TransactionId,
    pub completed_at: DateTime<Utc>,
}

impl Engine {
    /// Creates or replaces a task template. Requires [`Role::Admin`].
    pub fn upsert_template(
        &self,
        actor: AccountId,
        template: TaskTemplate,
    ) -> Result<(), LedgerError> {
        self.roles.require(actor, Role::Admin)?;
        if template.reward <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.catalog.get(&template.plan_id).is_none() {
            return Err(LedgerError::PlanNotFound);
        }
        info!(admin = %actor, task = %template.id, plan = %template.plan_id, "task template saved");
        self.tasks.upsert(template);
        Ok(())
    }

    /// Deletes a task template. Requires [`Role::Admin`].
    ///
    /// Progress already recorded against the template is kept; a started task
    /// can no longer be completed.
    pub fn remove_template(
        &self,
        actor: AccountId,
        id: TaskTemplateId,
    ) -> Result<TaskTemplate, LedgerError> {
        self.roles.require(actor, Role::Admin)?;
        let removed = self.tasks.remove(id).ok_or(LedgerError::TaskNotFound)?;
        info!(admin = %actor, task = %id, "task template removed");
        Ok(removed)
    }

    /// Templates the account may work on today, with its progress on each.
    pub fn available_tasks(&self, account_id: AccountId) -> Result<Vec<TaskView>, LedgerError> {
        let account = self.account(account_id)?;
        let today = self.now().date_naive();
        let data = account.lock();
        let views = self
            .tasks
            .available(data.active_plan_id(), today)
            .into_iter()
            .map(|template| {
                let state = data
                    .tasks
                    .get(&template.id)
                    .map_or(TaskState::NotStarted, UserTaskStatus::state);
                TaskView { template, state }
            })
            .collect();
        Ok(views)
    }

    /// Records the start of a task.
    ///
    /// A start whose completion window has expired (see
    /// [`EngineConfig::task_start_expiry_factor`](crate::EngineConfig)) may be
    /// restarted; any other existing progress is left untouched.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TaskNotFound`] - Unknown template.
    /// - [`LedgerError::NotEligible`] - Template inactive, not for today, or for another plan.
    /// - [`LedgerError::AlreadyStarted`] - Started and not yet completed.
    /// - [`LedgerError::AlreadyCompleted`] - Reward already credited.
    pub fn start_task(
        &self,
        account_id: AccountId,
        template_id: TaskTemplateId,
    ) -> Result<UserTaskStatus, LedgerError> {
        let result = self.begin_task(account_id, template_id);
        if let Err(err) = &result {
            debug!(account = %account_id, task = %template_id, %err, "task start rejected");
        }
        result
    }

    fn begin_task(
        &self,
        account_id: AccountId,
        template_id: TaskTemplateId,
    ) -> Result<UserTaskStatus, LedgerError> {
        let template = self.tasks.get(template_id).ok_or(LedgerError::TaskNotFound)?;
        let account = self.account(account_id)?;
        let now = self.now();
        let mut data = account.lock();

        if !template.is_available_to(data.active_plan_id(), now.date_naive()) {
            return Err(LedgerError::NotEligible);
        }
        if let Some(status) = data.tasks.get(&template_id) {
            if status.completed {
                return Err(LedgerError::AlreadyCompleted);
            }
            if !self.start_expired(&template, status, now) {
                return Err(LedgerError::AlreadyStarted);
            }
        }

        let status = UserTaskStatus::started(template_id, now);
        data.tasks.insert(template_id, status.clone());
        info!(account = %account_id, task = %template_id, "task started");
        Ok(status)
    }

    /// Completes a started task and credits its reward exactly once.
    ///
    /// Elapsed time is measured with the engine clock from the recorded start.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TaskNotFound`] - Unknown template.
    /// - [`LedgerError::NotStarted`] - No start recorded.
    /// - [`LedgerError::AlreadyCompleted`] - Reward already credited.
    /// - [`LedgerError::TooEarly`] - Duration not yet elapsed.
    /// - [`LedgerError::StartExpired`] - Start too old; start again.
    /// - [`LedgerError::StoreUnavailable`] - Journal rejected the credit.
    pub fn complete_task(
        &self,
        account_id: AccountId,
        template_id: TaskTemplateId,
    ) -> Result<TaskCompletion, LedgerError> {
        let result = self.finish_task(account_id, template_id);
        if let Err(err) = &result {
            debug!(account = %account_id, task = %template_id, %err, "task completion rejected");
        }
        result
    }

    fn finish_task(
        &self,
        account_id: AccountId,
        template_id: TaskTemplateId,
    ) -> Result<TaskCompletion, LedgerError> {
        let template = self.tasks.get(template_id).ok_or(LedgerError::TaskNotFound)?;
        let account = self.account(account_id)?;
        let now = self.now();
        let mut data = account.lock();

        let status = data.tasks.get(&template_id).ok_or(LedgerError::NotStarted)?;
        if status.completed {
            return Err(LedgerError::AlreadyCompleted);
        }
        if now - status.started_at < template.duration() {
            return Err(LedgerError::TooEarly);
        }
        if self.start_expired(&template, status, now) {
            return Err(LedgerError::StartExpired);
        }

        let posting = Posting::credit(
            account_id,
            EntryKind::TaskReward,
            template.reward,
            format!("Task reward - {}", template.title),
        );
        let committed = self.commit(vec![posting], now)?;
        let transaction = committed[0].id;
        for tx in committed {
            data.apply(tx);
        }
        if let Some(status) = data.tasks.get_mut(&template_id) {
            status.completed = true;
            status.completed_at = Some(now);
        }

        info!(
            account = %account_id,
            task = %template_id,
            reward = %template.reward,
            "task completed"
        );
        Ok(TaskCompletion {
            template: template_id,
            reward: template.reward,
            transaction,
            completed_at: now,
        })
    }

    fn start_expired(
        &self,
        template: &TaskTemplate,
        status: &UserTaskStatus,
        now: DateTime<Utc>,
    ) -> bool {
        match self.config.task_start_expiry_factor {
            Some(factor) if factor > 0 && template.duration_seconds > 0 => {
                let window =
                    i64::from(template.duration_seconds).saturating_mul(i64::from(factor));
                (now - status.started_at).num_seconds() > window
            }
            _ => false,
        }
    }
}
