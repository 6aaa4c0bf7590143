use crate::error::{MaestroError, MaestroResult};
use crate::task::{Task, TaskStatus};
use std::collections::HashMap;

/// Ordered collection of the tasks of a single run.
///
/// Insertion order is preserved: routing picks the first matching pending
/// task, so the store must hand tasks back in the order the planner produced
/// them.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `tasks`.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Replace the working set.
    pub fn set_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Get a task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// All tasks in insertion order.
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    /// Consume the store, returning its tasks.
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Move a task to `status`, honouring the lifecycle rules.
    pub fn update_status(&mut self, id: &str, status: TaskStatus) -> MaestroResult<()> {
        self.get_mut(id)
            .ok_or_else(|| MaestroError::NotFound(id.to_string()))?
            .transition(status)
    }

    /// Set the result text of a task. Completed tasks are frozen.
    pub fn update_result(&mut self, id: &str, text: impl Into<String>) -> MaestroResult<()> {
        let task = self
            .get_mut(id)
            .ok_or_else(|| MaestroError::NotFound(id.to_string()))?;
        if task.status == TaskStatus::Completed {
            return Err(MaestroError::TaskLocked(id.to_string()));
        }
        task.result = Some(text.into());
        Ok(())
    }

    /// Replace the result text regardless of status.
    pub fn override_result(&mut self, id: &str, text: impl Into<String>) -> MaestroResult<()> {
        self.get_mut(id)
            .ok_or_else(|| MaestroError::NotFound(id.to_string()))?
            .result = Some(text.into());
        Ok(())
    }

    /// Tasks still waiting to run.
    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
    }

    /// Count of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Total number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the store holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check if all tasks are in a terminal state (completed or failed).
    pub fn is_done(&self) -> bool {
        self.tasks
            .iter()
            .all(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Failed))
    }

    /// Check for cycles in the dependency graph.
    /// Returns true if a cycle is detected.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashMap::new();
        self.tasks
            .iter()
            .any(|t| self.dfs_cycle(&t.id, &mut visited))
    }

    fn dfs_cycle<'a>(&'a self, id: &'a str, visited: &mut HashMap<&'a str, u8>) -> bool {
        match visited.get(id) {
            Some(1) => return true,  // back edge = cycle
            Some(2) => return false, // already processed
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(task) = self.get(id) {
            for dep in &task.dependencies {
                if self.dfs_cycle(dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn store() -> TaskStore {
        TaskStore::from_tasks(vec![
            Task::with_id("t1", "Design API", "software_architect"),
            Task::with_id("t2", "Implement API", "coder"),
            Task::with_id("t3", "Test API", "tester"),
        ])
    }

    #[test]
    fn empty_store_is_done() {
        let s = TaskStore::new();
        assert!(s.is_empty());
        assert!(s.is_done());
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn preserves_insertion_order() {
        let s = store();
        let ids: Vec<&str> = s.all().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn set_all_replaces_working_set() {
        let mut s = store();
        s.set_all(vec![Task::with_id("x", "Only", "coder")]);
        assert_eq!(s.len(), 1);
        assert!(s.get("t1").is_none());
    }

    #[test]
    fn update_status_and_result() {
        let mut s = store();
        s.update_status("t2", TaskStatus::InProgress).unwrap();
        s.update_result("t2", "done").unwrap();
        s.update_status("t2", TaskStatus::Completed).unwrap();
        let t = s.get("t2").unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.result.as_deref(), Some("done"));
        assert_eq!(s.pending_count(), 2);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut s = store();
        assert!(matches!(
            s.update_status("nope", TaskStatus::InProgress),
            Err(MaestroError::NotFound(_))
        ));
        assert!(matches!(
            s.update_result("nope", "x"),
            Err(MaestroError::NotFound(_))
        ));
    }

    #[test]
    fn completed_result_is_frozen() {
        let mut s = store();
        s.update_status("t1", TaskStatus::InProgress).unwrap();
        s.update_result("t1", "final").unwrap();
        s.update_status("t1", TaskStatus::Completed).unwrap();

        assert!(matches!(
            s.update_result("t1", "overwritten"),
            Err(MaestroError::TaskLocked(id)) if id == "t1"
        ));
        assert_eq!(s.get("t1").unwrap().result.as_deref(), Some("final"));

        s.override_result("t1", "amended").unwrap();
        assert_eq!(s.get("t1").unwrap().result.as_deref(), Some("amended"));
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut s = store();
        assert!(s.update_status("t1", TaskStatus::Completed).is_err());
        assert_eq!(s.get("t1").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn detects_dependency_cycle() {
        let s = TaskStore::from_tasks(vec![
            Task::with_id("a", "A", "coder").with_dependencies(vec!["b".into()]),
            Task::with_id("b", "B", "coder").with_dependencies(vec!["a".into()]),
        ]);
        assert!(s.has_cycle());
    }

    #[test]
    fn chain_has_no_cycle() {
        let s = TaskStore::from_tasks(vec![
            Task::with_id("a", "A", "coder"),
            Task::with_id("b", "B", "tester").with_dependencies(vec!["a".into()]),
        ]);
        assert!(!s.has_cycle());
    }
}
