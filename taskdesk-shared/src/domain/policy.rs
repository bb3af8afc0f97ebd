/// Authorization policy for tasks
///
/// Pure predicates over a task, its assignee set and the acting user id.
/// They only answer "may this actor do this"; the use-case layer decides
/// which error the caller sees (a view denial is reported as not-found so
/// that a task's existence is not leaked, every other denial as forbidden).
///
/// | Action           | Owner | Assignee | Anyone else |
/// |------------------|-------|----------|-------------|
/// | view             | yes   | yes      | no          |
/// | edit             | yes   | no       | no          |
/// | delete           | yes   | no       | no          |
/// | manage assignees | yes   | no       | no          |

use super::assignee::TaskAssignee;
use super::task::Task;

pub fn can_view(task: &Task, assignees: &[TaskAssignee], actor_id: i64) -> bool {
    task.is_owner(actor_id) || assignees.iter().any(|a| a.user_id == actor_id)
}

pub fn can_edit(task: &Task, actor_id: i64) -> bool {
    task.is_owner(actor_id)
}

pub fn can_delete(task: &Task, actor_id: i64) -> bool {
    task.is_owner(actor_id)
}

pub fn can_manage_assignees(task: &Task, actor_id: i64) -> bool {
    task.is_owner(actor_id)
}
