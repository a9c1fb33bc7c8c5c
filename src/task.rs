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

//! Task templates and per-account task progress.
//!
//! Per (account, template) the progress is a small state machine:
//!
//! ```text
//! NotStarted ──start──► Started ──complete (after duration)──► Completed
//! ```
//!
//! `Completed` is terminal and the reward is credited on that transition only.

use crate::base::{PlanId, TaskTemplateId};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Admin-defined task offered to accounts on one plan for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: TaskTemplateId,
    pub title: String,
    pub reward: Decimal,
    pub plan_id: PlanId,
    /// Minimum time between start and complete.
    pub duration_seconds: u32,
    pub active_date: NaiveDate,
    pub is_active: bool,
}

impl TaskTemplate {
    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.duration_seconds))
    }

    /// Whether an account on `plan` may start this task on `today`.
    pub fn is_available_to(&self, plan: Option<&PlanId>, today: NaiveDate) -> bool {
        self.is_active && self.active_date == today && plan == Some(&self.plan_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    NotStarted,
    Started,
    Completed,
}

/// Progress of one account on one template. Created on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTaskStatus {
    pub template_id: TaskTemplateId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl UserTaskStatus {
    pub(crate) fn started(template_id: TaskTemplateId, at: DateTime<Utc>) -> Self {
        Self {
            template_id,
            started_at: at,
            completed_at: None,
            completed: false,
        }
    }

    pub fn state(&self) -> TaskState {
        if self.completed {
            TaskState::Completed
        } else {
            TaskState::Started
        }
    }
}

/// Template as seen by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub template: TaskTemplate,
    pub state: TaskState,
}

/// Concurrent store of task templates.
#[derive(Debug, Default)]
pub struct TaskBoard {
    templates: DashMap<TaskTemplateId, TaskTemplate>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy so no map lock outlives the call.
    pub fn get(&self, id: TaskTemplateId) -> Option<TaskTemplate> {
        self.templates.get(&id).map(|entry| entry.value().clone())
    }

    pub(crate) fn upsert(&self, template: TaskTemplate) -> Option<TaskTemplate> {
        self.templates.insert(template.id, template)
    }

    pub(crate) fn remove(&self, id: TaskTemplateId) -> Option<TaskTemplate> {
        self.templates.remove(&id).map(|(_, template)| template)
    }

    /// Templates available to `plan` on `today`, ordered by ID.
    pub fn available(&self, plan: Option<&PlanId>, today: NaiveDate) -> Vec<TaskTemplate> {
        let mut templates: Vec<_> = self
            .templates
            .iter()
            .filter(|entry| entry.is_available_to(plan, today))
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by_key(|template| template.id);
        templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
