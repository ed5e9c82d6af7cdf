//! In-memory repositories.
//!
//! Process-local stores with the same contracts as the PostgreSQL
//! repositories, including the conditional lock and the partner table
//! constraints. Used by the test suites and for running without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    MapperLevel, Partner, PartnerRecord, PartnerRepository, PartnerStoreError, Project,
    ProjectRepository, Task, TaskAction, TaskHistory, TaskLock, TaskRepository, TaskStatus,
    TaskUpdate, User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct TaskTable {
    tasks: BTreeMap<(i64, i64), Task>,
    history: Vec<TaskHistory>,
    next_history_id: i64,
}

impl TaskTable {
    fn append(&mut self, mut entry: TaskHistory) {
        self.next_history_id += 1;
        entry.id = self.next_history_id;
        self.history.push(entry);
    }
}

/// In-memory [`TaskRepository`].
#[derive(Default)]
pub struct InMemoryTaskRepository {
    table: RwLock<TaskTable>,
}

impl InMemoryTaskRepository {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::default();
        for task in tasks {
            repo.insert(task);
        }
        repo
    }

    pub fn insert(&self, task: Task) {
        self.table
            .write()
            .tasks
            .insert((task.project_id, task.id), task);
    }

    /// Snapshot of a stored task.
    pub fn get(&self, project_id: i64, task_id: i64) -> Option<Task> {
        self.table.read().tasks.get(&(project_id, task_id)).cloned()
    }

    /// Append a history entry directly, bypassing any task update.
    pub fn record(&self, entry: TaskHistory) {
        self.table.write().append(entry);
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find(&self, project_id: i64, task_id: i64) -> Result<Option<Task>, AppError> {
        Ok(self.table.read().tasks.get(&(project_id, task_id)).cloned())
    }

    async fn find_by_project(&self, project_id: i64) -> Result<Vec<Task>, AppError> {
        Ok(self
            .table
            .read()
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_locked_by_user(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Vec<Task>, AppError> {
        Ok(self
            .table
            .read()
            .tasks
            .values()
            .filter(|t| t.project_id == project_id && t.is_locked_by(user_id))
            .cloned()
            .collect())
    }

    async fn find_expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
        Ok(self
            .table
            .read()
            .tasks
            .values()
            .filter(|t| t.status.is_locked() && t.lock_expires_at.is_some_and(|at| at < now))
            .cloned()
            .collect())
    }

    async fn lock_tasks(
        &self,
        project_id: i64,
        task_ids: &[i64],
        allowed: &[TaskStatus],
        lock: TaskLock,
    ) -> Result<Option<Vec<Task>>, AppError> {
        let ids: BTreeSet<i64> = task_ids.iter().copied().collect();
        let mut table = self.table.write();

        let all_available = ids.iter().all(|id| {
            table
                .tasks
                .get(&(project_id, *id))
                .is_some_and(|t| allowed.contains(&t.status))
        });
        if !all_available {
            return Ok(None);
        }

        let mut locked = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(task) = table.tasks.get_mut(&(project_id, *id)) else {
                continue;
            };
            task.status = lock.status;
            task.locked_by = Some(lock.user_id);
            task.lock_expires_at = Some(lock.expires_at);
            let task = task.clone();

            let entry = TaskHistory::new(&task, lock.history_action(), None, lock.user_id);
            table.append(entry);
            locked.push(task);
        }
        Ok(Some(locked))
    }

    async fn save_all(&self, updates: Vec<TaskUpdate>) -> Result<Option<Vec<Task>>, AppError> {
        let mut table = self.table.write();

        // Check guards in order, each against the row as earlier updates leave it.
        let mut staged: BTreeMap<(i64, i64), &Task> = BTreeMap::new();
        for update in &updates {
            let key = (update.task.project_id, update.task.id);
            let current = staged.get(&key).copied().or_else(|| table.tasks.get(&key));
            if !current.is_some_and(|stored| update.expected.matches(stored)) {
                return Ok(None);
            }
            staged.insert(key, &update.task);
        }

        let mut saved = Vec::with_capacity(updates.len());
        for TaskUpdate { task, history, .. } in updates {
            for entry in history {
                table.append(entry);
            }
            table.tasks.insert((task.project_id, task.id), task.clone());
            saved.push(task);
        }
        Ok(Some(saved))
    }

    async fn history(&self, project_id: i64, task_id: i64) -> Result<Vec<TaskHistory>, AppError> {
        Ok(self
            .table
            .read()
            .history
            .iter()
            .filter(|h| h.project_id == project_id && h.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn split(
        &self,
        parent: &Task,
        children: Vec<Task>,
        user_id: i64,
    ) -> Result<Option<Vec<Task>>, AppError> {
        let mut table = self.table.write();

        let still_locked = table
            .tasks
            .get(&(parent.project_id, parent.id))
            .is_some_and(|t| t.status == parent.status && t.locked_by == Some(user_id));
        if !still_locked {
            return Ok(None);
        }

        let inherited: Vec<TaskHistory> = table
            .history
            .iter()
            .filter(|h| h.project_id == parent.project_id && h.task_id == parent.id)
            .cloned()
            .collect();
        table.tasks.remove(&(parent.project_id, parent.id));
        table
            .history
            .retain(|h| !(h.project_id == parent.project_id && h.task_id == parent.id));

        let mut next_id = table
            .tasks
            .keys()
            .filter(|(project_id, _)| *project_id == parent.project_id)
            .map(|(_, id)| *id)
            .max()
            .unwrap_or(0)
            .max(parent.id);

        let mut created = Vec::with_capacity(children.len());
        for mut child in children {
            next_id += 1;
            child.id = next_id;
            child.project_id = parent.project_id;

            for entry in &inherited {
                let mut copy = entry.clone();
                copy.task_id = child.id;
                table.append(copy);
            }
            let note = format!("Split from task {}", parent.id);
            table.append(TaskHistory::new(&child, TaskAction::Split, Some(note), user_id));

            table.tasks.insert((child.project_id, child.id), child.clone());
            created.push(child);
        }
        Ok(Some(created))
    }

    async fn count_mapped_by(&self, user_id: i64) -> Result<i64, AppError> {
        let count = self
            .table
            .read()
            .tasks
            .values()
            .filter(|t| t.mapped_by == Some(user_id))
            .count();
        Ok(count as i64)
    }
}

/// In-memory [`ProjectRepository`].
#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: RwLock<HashMap<i64, Project>>,
}

impl InMemoryProjectRepository {
    pub fn insert(&self, project: Project) {
        self.projects.write().insert(project.id, project);
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError> {
        Ok(self.projects.read().get(&id).cloned())
    }

    async fn exists(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.projects.read().contains_key(&id))
    }
}

/// In-memory [`UserRepository`].
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
}

impl InMemoryUserRepository {
    pub fn insert(&self, user: User) {
        self.users.write().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn update_mapping_level(&self, id: i64, level: MapperLevel) -> Result<(), AppError> {
        if let Some(user) = self.users.write().get_mut(&id) {
            user.mapping_level = level;
        }
        Ok(())
    }
}

/// In-memory [`PartnerRepository`] enforcing the `partners` table constraints.
#[derive(Default)]
pub struct InMemoryPartnerRepository {
    partners: RwLock<BTreeMap<i64, Partner>>,
}

impl InMemoryPartnerRepository {
    fn check(
        partners: &BTreeMap<i64, Partner>,
        record: &PartnerRecord,
        id: Option<i64>,
    ) -> Result<(String, String), PartnerStoreError> {
        let name = record
            .name
            .clone()
            .ok_or_else(|| PartnerStoreError::NotNullViolation("name".into()))?;
        let primary_hashtag = record
            .primary_hashtag
            .clone()
            .ok_or_else(|| PartnerStoreError::NotNullViolation("primary_hashtag".into()))?;
        if partners
            .values()
            .any(|p| p.name == name && Some(p.id) != id)
        {
            return Err(PartnerStoreError::UniqueViolation("partners_name_key".into()));
        }
        Ok((name, primary_hashtag))
    }

    fn build(id: i64, name: String, primary_hashtag: String, record: &PartnerRecord) -> Partner {
        Partner {
            id,
            name,
            primary_hashtag,
            secondary_hashtag: record.secondary_hashtag.clone(),
            logo_url: record.logo_url.clone(),
            link_meta: record.link_meta.clone(),
            link_x: record.link_x.clone(),
            link_instagram: record.link_instagram.clone(),
            current_projects: record.current_projects.clone(),
            permalink: record.permalink.clone(),
            website_links: record.website_links.clone(),
        }
    }
}

#[async_trait]
impl PartnerRepository for InMemoryPartnerRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Partner>, AppError> {
        Ok(self.partners.read().get(&id).cloned())
    }

    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<Partner>, AppError> {
        Ok(self
            .partners
            .read()
            .values()
            .find(|p| p.permalink.as_deref() == Some(permalink))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Partner>, AppError> {
        Ok(self.partners.read().values().cloned().collect())
    }

    async fn create(&self, record: &PartnerRecord) -> Result<Partner, PartnerStoreError> {
        let mut partners = self.partners.write();
        let (name, primary_hashtag) = Self::check(&partners, record, None)?;
        let id = partners.keys().next_back().copied().unwrap_or(0) + 1;
        let partner = Self::build(id, name, primary_hashtag, record);
        partners.insert(id, partner.clone());
        Ok(partner)
    }

    async fn update(&self, id: i64, record: &PartnerRecord) -> Result<Partner, PartnerStoreError> {
        let mut partners = self.partners.write();
        if !partners.contains_key(&id) {
            return Err(AppError::not_found("PartnerNotFound-Partner not found").into());
        }
        let (name, primary_hashtag) = Self::check(&partners, record, Some(id))?;
        let partner = Self::build(id, name, primary_hashtag, record);
        partners.insert(id, partner.clone());
        Ok(partner)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.partners.write().remove(&id).is_some())
    }
}
