//! The in-memory entity store and the mutators that replace it.
//!
//! Every mutator takes the previous user list by reference and returns a
//! fresh one, so a [`Store`] is an immutable snapshot that the controller
//! swaps out wholesale. Ids that match nothing make a mutation a no-op.

use crate::models::{Collection, EntityId, Product, Task, TaskStatus, User};
use chrono::Utc;

/// Field values collected by the user form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub username: String,
    pub phone: String,
    pub website: String,
}

/// Field values collected by the task form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub status: TaskStatus,
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    CreateUser(UserDraft),
    UpdateUser {
        id: EntityId,
        draft: UserDraft,
    },
    DeleteUser(EntityId),
    CreateTask {
        user_id: EntityId,
        draft: TaskDraft,
    },
    UpdateTask {
        user_id: EntityId,
        task_id: EntityId,
        draft: TaskDraft,
    },
    DeleteTask {
        user_id: EntityId,
        task_id: EntityId,
    },
    ToggleTask {
        user_id: EntityId,
        task_id: EntityId,
    },
}

/// Hands out creation-time ids in milliseconds. Two creations in the
/// same millisecond still get distinct ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: EntityId,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> EntityId {
        let now = Utc::now().timestamp_millis().max(0) as EntityId;
        let id = now.max(self.last + 1);
        self.last = id;
        id
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Store {
    collection: Collection,
}

impl Store {
    pub fn new(collection: Collection) -> Store {
        Store { collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn users(&self) -> Option<&[User]> {
        match &self.collection {
            Collection::Users(users) => Some(users),
            _ => None,
        }
    }

    pub fn products(&self) -> Option<&[Product]> {
        match &self.collection {
            Collection::Products(products) => Some(products),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn user(&self, id: EntityId) -> Option<&User> {
        self.users()?.iter().find(|user| user.id == id)
    }

    /// Produce the next snapshot. Returns the id of a created entity, if any.
    /// Only a users collection can be mutated; anything else is returned as is.
    pub fn apply(&self, mutation: Mutation, ids: &mut IdGenerator) -> (Store, Option<EntityId>) {
        let users = match &self.collection {
            Collection::Users(users) => users,
            _ => return (self.clone(), None),
        };

        let mut created = None;
        let next = match mutation {
            Mutation::CreateUser(draft) => {
                let id = ids.next_id();
                created = Some(id);
                create_user(users, id, draft)
            }
            Mutation::UpdateUser { id, draft } => update_user(users, id, draft),
            Mutation::DeleteUser(id) => delete_user(users, id),
            Mutation::CreateTask { user_id, draft } => {
                let id = ids.next_id();
                let next = create_task(users, user_id, id, draft);
                if next.iter().any(|user| user.id == user_id) {
                    created = Some(id);
                }
                next
            }
            Mutation::UpdateTask {
                user_id,
                task_id,
                draft,
            } => update_task(users, user_id, task_id, draft),
            Mutation::DeleteTask { user_id, task_id } => delete_task(users, user_id, task_id),
            Mutation::ToggleTask { user_id, task_id } => toggle_task(users, user_id, task_id),
        };

        (Store::new(Collection::Users(next)), created)
    }
}

pub fn create_user(users: &[User], id: EntityId, draft: UserDraft) -> Vec<User> {
    let mut next = users.to_vec();
    next.push(User {
        id,
        name: draft.name,
        email: draft.email,
        username: draft.username,
        phone: draft.phone,
        website: draft.website,
        tasks: Vec::new(),
    });
    next
}

/// Replace a user's fields, keeping its id and tasks.
pub fn update_user(users: &[User], id: EntityId, draft: UserDraft) -> Vec<User> {
    users
        .iter()
        .map(|user| {
            if user.id == id {
                User {
                    id,
                    name: draft.name.clone(),
                    email: draft.email.clone(),
                    username: draft.username.clone(),
                    phone: draft.phone.clone(),
                    website: draft.website.clone(),
                    tasks: user.tasks.clone(),
                }
            } else {
                user.clone()
            }
        })
        .collect()
}

pub fn delete_user(users: &[User], id: EntityId) -> Vec<User> {
    users.iter().filter(|user| user.id != id).cloned().collect()
}

fn with_tasks<F>(users: &[User], user_id: EntityId, change: F) -> Vec<User>
where
    F: Fn(&[Task]) -> Vec<Task>,
{
    users
        .iter()
        .map(|user| {
            if user.id == user_id {
                User {
                    tasks: change(&user.tasks),
                    ..user.clone()
                }
            } else {
                user.clone()
            }
        })
        .collect()
}

pub fn create_task(users: &[User], user_id: EntityId, id: EntityId, draft: TaskDraft) -> Vec<User> {
    with_tasks(users, user_id, |tasks| {
        let mut next = tasks.to_vec();
        next.push(Task {
            id,
            title: draft.title.clone(),
            status: draft.status,
            completed: draft.completed,
            user_id,
        });
        next
    })
}

pub fn update_task(
    users: &[User],
    user_id: EntityId,
    task_id: EntityId,
    draft: TaskDraft,
) -> Vec<User> {
    with_tasks(users, user_id, |tasks| {
        tasks
            .iter()
            .map(|task| {
                if task.id == task_id {
                    Task {
                        title: draft.title.clone(),
                        status: draft.status,
                        completed: draft.completed,
                        ..task.clone()
                    }
                } else {
                    task.clone()
                }
            })
            .collect()
    })
}

pub fn delete_task(users: &[User], user_id: EntityId, task_id: EntityId) -> Vec<User> {
    with_tasks(users, user_id, |tasks| {
        tasks.iter().filter(|task| task.id != task_id).cloned().collect()
    })
}

/// Flip `completed` on one task. Status is left alone.
pub fn toggle_task(users: &[User], user_id: EntityId, task_id: EntityId) -> Vec<User> {
    with_tasks(users, user_id, |tasks| {
        tasks
            .iter()
            .map(|task| {
                if task.id == task_id {
                    Task {
                        completed: !task.completed,
                        ..task.clone()
                    }
                } else {
                    task.clone()
                }
            })
            .collect()
    })
}

/// The first `window` items in their original order.
pub fn visible<T>(items: &[T], window: usize) -> &[T] {
    &items[..items.len().min(window)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(id: EntityId, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            username: name.to_lowercase(),
            phone: "555-0100".to_string(),
            website: "example.com".to_string(),
            tasks: Vec::new(),
        }
    }

    fn draft(name: &str) -> UserDraft {
        UserDraft {
            name: name.to_string(),
            email: "new@example.com".to_string(),
            username: "newbie".to_string(),
            phone: "555-0199".to_string(),
            website: "new.example.com".to_string(),
        }
    }

    fn task_draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            status: TaskStatus::ToDo,
            completed: false,
        }
    }

    fn seeded() -> Store {
        Store::new(Collection::Users(vec![user(1, "Leanne"), user(2, "Ervin")]))
    }

    #[test]
    fn test_create_then_delete_restores_collection() {
        let mut ids = IdGenerator::default();
        let before = seeded();

        let (after_create, created) = before.apply(Mutation::CreateUser(draft("Clementine")), &mut ids);
        let id = created.unwrap();
        let users = after_create.users().unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[2].id, id);
        assert!(users[2].tasks.is_empty());

        let (after_delete, _) = after_create.apply(Mutation::DeleteUser(id), &mut ids);
        assert_eq!(after_delete, before);
    }

    #[test]
    fn test_update_absent_user_is_noop() {
        let mut ids = IdGenerator::default();
        let before = seeded();
        let (after, created) = before.apply(
            Mutation::UpdateUser {
                id: 99,
                draft: draft("Nobody"),
            },
            &mut ids,
        );
        assert_eq!(after, before);
        assert_eq!(created, None);
    }

    #[test]
    fn test_update_user_keeps_id_and_tasks() {
        let mut ids = IdGenerator::default();
        let (with_task, task_id) = seeded().apply(
            Mutation::CreateTask {
                user_id: 1,
                draft: task_draft("Call back"),
            },
            &mut ids,
        );
        let (after, _) = with_task.apply(
            Mutation::UpdateUser {
                id: 1,
                draft: draft("Leanne Graham"),
            },
            &mut ids,
        );
        let updated = after.user(1).unwrap();
        assert_eq!(updated.name, "Leanne Graham");
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.tasks.len(), 1);
        assert_eq!(Some(updated.tasks[0].id), task_id);
        assert_eq!(after.user(2), with_task.user(2));
    }

    #[test]
    fn test_toggle_twice_restores_task() {
        let mut ids = IdGenerator::default();
        let (base, _) = seeded().apply(
            Mutation::CreateTask {
                user_id: 2,
                draft: task_draft("Other"),
            },
            &mut ids,
        );
        let (with_task, task_id) = base.apply(
            Mutation::CreateTask {
                user_id: 1,
                draft: task_draft("Ship it"),
            },
            &mut ids,
        );
        let task_id = task_id.unwrap();
        let toggle = Mutation::ToggleTask {
            user_id: 1,
            task_id,
        };

        let (once, _) = with_task.apply(toggle.clone(), &mut ids);
        let toggled = &once.user(1).unwrap().tasks[0];
        assert!(toggled.completed);
        assert_eq!(toggled.status, TaskStatus::ToDo);
        assert_eq!(once.user(2), with_task.user(2));

        let (twice, _) = once.apply(toggle, &mut ids);
        assert_eq!(twice, with_task);
    }

    #[test]
    fn test_delete_absent_task_keeps_list() {
        let mut ids = IdGenerator::default();
        let (with_task, _) = seeded().apply(
            Mutation::CreateTask {
                user_id: 1,
                draft: task_draft("Keep me"),
            },
            &mut ids,
        );
        let (after, _) = with_task.apply(
            Mutation::DeleteTask {
                user_id: 1,
                task_id: 12345,
            },
            &mut ids,
        );
        assert_eq!(after, with_task);
    }

    #[test]
    fn test_task_for_absent_user_is_noop() {
        let mut ids = IdGenerator::default();
        let before = seeded();
        let (after, created) = before.apply(
            Mutation::CreateTask {
                user_id: 42,
                draft: task_draft("Lost"),
            },
            &mut ids,
        );
        assert_eq!(after, before);
        assert_eq!(created, None);
    }

    #[test]
    fn test_update_and_delete_task() {
        let mut ids = IdGenerator::default();
        let (with_task, task_id) = seeded().apply(
            Mutation::CreateTask {
                user_id: 1,
                draft: task_draft("Draft"),
            },
            &mut ids,
        );
        let task_id = task_id.unwrap();
        let (updated, _) = with_task.apply(
            Mutation::UpdateTask {
                user_id: 1,
                task_id,
                draft: TaskDraft {
                    title: "Final".to_string(),
                    status: TaskStatus::Done,
                    completed: false,
                },
            },
            &mut ids,
        );
        let task = &updated.user(1).unwrap().tasks[0];
        assert_eq!(task.id, task_id);
        assert_eq!(task.user_id, 1);
        assert_eq!(task.title, "Final");
        // status and completed may disagree
        assert_eq!(task.status, TaskStatus::Done);
        assert!(!task.completed);

        let (deleted, _) = updated.apply(Mutation::DeleteTask { user_id: 1, task_id }, &mut ids);
        assert!(deleted.user(1).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_products_are_never_mutated() {
        let mut ids = IdGenerator::default();
        let before = Store::new(Collection::Products(Vec::new()));
        let (after, created) = before.apply(Mutation::CreateUser(draft("Ghost")), &mut ids);
        assert_eq!(after, before);
        assert_eq!(created, None);
    }

    #[test]
    fn test_ids_are_unique_within_one_tick() {
        let mut ids = IdGenerator::default();
        let first = ids.next_id();
        let second = ids.next_id();
        let third = ids.next_id();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_visible_is_a_prefix_window() {
        let items: Vec<u32> = (1..=8).collect();
        assert_eq!(visible(&items, 5), &[1, 2, 3, 4, 5]);
        assert_eq!(visible(&items, 20), items.as_slice());
        assert_eq!(visible(&items[..3], 5), &[1, 2, 3]);
        assert!(visible(&items, 0).is_empty());
    }
}
