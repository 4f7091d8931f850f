use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::{
    Evidence, Priority, Role, Severity, Task, TaskStatus, User, WasteCategory, WasteLog,
    WasteLogStatus,
};

/// The caller's already-authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn can_assign(&self) -> bool {
        matches!(self.role, Role::Admin | Role::BlockAdmin)
    }

    pub fn can_update_status(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }

    pub fn can_report(&self) -> bool {
        !matches!(self.role, Role::BlockAdmin)
    }
}

/// Persistence seen by the coordinator. Pair writes must be atomic, and
/// `insert_assignment` must reject a second task for the same waste log
/// with `CoreError::Conflict` even when two callers race.
/// `save_transition` only applies while the stored task still has the
/// `previous` status; otherwise it returns `CoreError::Conflict`.
#[async_trait]
pub trait CampusStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;
    async fn get_waste_log(&self, id: Uuid) -> CoreResult<Option<WasteLog>>;
    async fn get_task(&self, id: Uuid) -> CoreResult<Option<Task>>;
    async fn task_for_waste_log(&self, waste_log_id: Uuid) -> CoreResult<Option<Task>>;
    async fn insert_waste_log(&self, log: &WasteLog) -> CoreResult<()>;
    async fn insert_assignment(&self, task: &Task, log: &WasteLog) -> CoreResult<()>;
    async fn save_transition(
        &self,
        task: &Task,
        previous: TaskStatus,
        log: &WasteLog,
    ) -> CoreResult<()>;
}

#[derive(Debug, Clone)]
pub struct WasteReport {
    pub location: String,
    pub category: WasteCategory,
    pub quantity_kg: f64,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssignRequest {
    pub waste_log_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone)]
pub struct StatusUpdateRequest {
    pub task_id: Uuid,
    pub status: String,
    pub evidence: Evidence,
}

/// A status update that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub evidence: Evidence,
}

impl StatusUpdateRequest {
    pub fn validate(self) -> CoreResult<StatusUpdate> {
        let status: TaskStatus = self.status.parse()?;
        if status == TaskStatus::Created {
            return Err(CoreError::validation(
                "tasks cannot be moved back to Created",
            ));
        }

        let evidence = Evidence {
            image_url: non_blank(self.evidence.image_url),
            notes: non_blank(self.evidence.notes),
        };
        if status == TaskStatus::Completed && evidence.image_url.is_none() {
            return Err(CoreError::validation(
                "completing a task requires an evidence image_url",
            ));
        }

        Ok(StatusUpdate {
            task_id: self.task_id,
            status,
            evidence,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub previous: TaskStatus,
    pub task: Task,
    pub waste_log: WasteLog,
}

pub struct Coordinator<S> {
    store: S,
}

impl<S: CampusStore> Coordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn report_waste(&self, actor: &Actor, report: WasteReport) -> CoreResult<WasteLog> {
        if !actor.can_report() {
            return Err(CoreError::forbidden("block admins cannot file waste reports"));
        }
        let location = report.location.trim().to_string();
        if location.is_empty() {
            return Err(CoreError::validation("location is required"));
        }
        if !report.quantity_kg.is_finite() || report.quantity_kg < 0.0 {
            return Err(CoreError::validation(format!(
                "quantity_kg must be a non-negative number, got {}",
                report.quantity_kg
            )));
        }

        let now = Utc::now();
        let log = WasteLog {
            id: Uuid::new_v4(),
            reporter_id: actor.id,
            location,
            category: report.category,
            quantity_kg: report.quantity_kg,
            description: report.description.trim().to_string(),
            status: WasteLogStatus::Reported,
            severity: report.severity,
            reported_at: now,
            updated_at: now,
        };
        self.store.insert_waste_log(&log).await?;
        info!(
            target: "ecocampus::coordinator",
            waste_log_id = %log.id,
            location = %log.location,
            "waste reported"
        );
        Ok(log)
    }

    /// Creates the single task for a waste log and marks the log Assigned.
    pub async fn assign(&self, actor: &Actor, request: AssignRequest) -> CoreResult<Task> {
        if !actor.can_assign() {
            return Err(CoreError::forbidden(format!(
                "role {} cannot assign tasks",
                actor.role
            )));
        }
        let waste_log_id = request
            .waste_log_id
            .ok_or_else(|| CoreError::validation("waste_log_id is required"))?;
        let staff_id = request
            .staff_id
            .ok_or_else(|| CoreError::validation("staff_id is required"))?;

        let mut log = self
            .store
            .get_waste_log(waste_log_id)
            .await?
            .ok_or_else(|| CoreError::not_found("waste log", waste_log_id))?;
        let staff = self
            .store
            .get_user(staff_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", staff_id))?;
        if staff.role != Role::Staff {
            return Err(CoreError::validation(format!(
                "{} is a {}, tasks can only go to staff",
                staff.email, staff.role
            )));
        }

        if let Some(existing) = self.store.task_for_waste_log(waste_log_id).await? {
            return Err(CoreError::conflict(format!(
                "waste log {waste_log_id} already has task {}",
                existing.id
            )));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            waste_log_id,
            assigned_by: actor.id,
            assigned_to: Some(staff.id),
            status: TaskStatus::Assigned,
            priority: request.priority.unwrap_or(Priority::Normal),
            evidence: Evidence::default(),
            assigned_at: Some(now),
            completed_at: None,
            updated_at: now,
        };
        log.status = WasteLogStatus::Assigned;
        log.updated_at = now;

        self.store.insert_assignment(&task, &log).await?;
        info!(
            target: "ecocampus::coordinator",
            task_id = %task.id,
            waste_log_id = %waste_log_id,
            staff = %staff.email,
            priority = %task.priority,
            "task assigned"
        );
        Ok(task)
    }

    /// Moves a task to a new status and mirrors it onto the waste log.
    pub async fn update_status(
        &self,
        actor: &Actor,
        request: StatusUpdateRequest,
    ) -> CoreResult<StatusChange> {
        let update = request.validate()?;
        if !actor.can_update_status() {
            return Err(CoreError::forbidden(format!(
                "role {} cannot update task status",
                actor.role
            )));
        }

        let mut task = self
            .store
            .get_task(update.task_id)
            .await?
            .ok_or_else(|| CoreError::not_found("task", update.task_id))?;
        let previous = task.status;
        check_transition(actor, &task, update.status)?;

        let mut log = self
            .store
            .get_waste_log(task.waste_log_id)
            .await?
            .ok_or_else(|| CoreError::not_found("waste log", task.waste_log_id))?;

        let now = Utc::now();
        task.status = update.status;
        if update.evidence.image_url.is_some() {
            task.evidence.image_url = update.evidence.image_url;
        }
        if update.evidence.notes.is_some() {
            task.evidence.notes = update.evidence.notes;
        }
        if update.status == TaskStatus::Completed {
            task.completed_at = Some(now);
        } else if update.status.is_done() {
            task.completed_at.get_or_insert(now);
        } else {
            task.completed_at = None;
        }
        task.updated_at = now;

        log.status = WasteLogStatus::from(update.status);
        log.updated_at = now;

        self.store.save_transition(&task, previous, &log).await?;
        debug!(
            target: "ecocampus::coordinator",
            task_id = %task.id,
            from = %previous,
            to = %task.status,
            "transition saved"
        );
        info!(
            target: "ecocampus::coordinator",
            task_id = %task.id,
            waste_log_id = %log.id,
            status = %task.status,
            "task status updated"
        );

        Ok(StatusChange {
            previous,
            task,
            waste_log: log,
        })
    }
}

/// Verified is final. Staff only move their own tasks forward; admins may
/// also correct a status backwards and are the only ones who verify.
fn check_transition(actor: &Actor, task: &Task, target: TaskStatus) -> CoreResult<()> {
    if task.status.is_terminal() {
        return Err(CoreError::validation(format!(
            "task {} is already Verified",
            task.id
        )));
    }
    if actor.role == Role::Admin {
        return Ok(());
    }
    if task.assigned_to != Some(actor.id) {
        return Err(CoreError::forbidden(format!(
            "task {} is not assigned to this staff member",
            task.id
        )));
    }
    if target == TaskStatus::Verified {
        return Err(CoreError::forbidden("only admins can verify tasks"));
    }
    if target < task.status {
        return Err(CoreError::validation(format!(
            "cannot move task from {} back to {}",
            task.status, target
        )));
    }
    Ok(())
}
