//! Filtered/sorted projection of a board layout.
//!
//! The projection never changes persisted order; it only decides which tasks
//! are shown and in what sequence. Drag indices refer to this projection and
//! are mapped back to unfiltered positions by [`super::drag`].

use std::cmp::Ordering;

use crate::board::models::{
    FilterItem, FilterKind, FilterOperator, SavedView, SortDir, SortKey, SortSpec, Task,
};

use super::state::BoardLayout;

/// Active filters plus sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewParams {
    pub filters: Vec<FilterItem>,
    pub sort: SortSpec,
}

impl ViewParams {
    pub fn from_saved(view: &SavedView) -> Self {
        Self {
            filters: view.filters.clone(),
            sort: view.sort.unwrap_or_default(),
        }
    }
}

/// Visible task ids of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjection {
    pub column_id: i64,
    pub task_ids: Vec<i64>,
}

/// Project every column of `layout` through `params`.
pub fn project(layout: &BoardLayout, params: &ViewParams) -> Vec<ColumnProjection> {
    layout
        .columns
        .iter()
        .map(|c| ColumnProjection {
            column_id: c.column.id,
            task_ids: visible_tasks(&c.tasks, params)
                .iter()
                .map(|t| t.id)
                .collect(),
        })
        .collect()
}

/// Filter then sort `tasks`, which must be in persisted order.
pub fn visible_tasks<'a>(tasks: &'a [Task], params: &ViewParams) -> Vec<&'a Task> {
    let mut visible: Vec<&Task> = tasks
        .iter()
        .filter(|t| matches_filters(t, &params.filters))
        .collect();
    sort_tasks(&mut visible, params.sort);
    visible
}

/// True when `task` passes every filter. Filters with a blank value are ignored.
pub fn matches_filters(task: &Task, filters: &[FilterItem]) -> bool {
    filters.iter().all(|f| matches_filter(task, f))
}

fn matches_filter(task: &Task, filter: &FilterItem) -> bool {
    let value = filter.value.trim().to_lowercase();
    if value.is_empty() {
        return true;
    }

    match filter.kind {
        FilterKind::Assignee => {
            let ids: Vec<String> = task.assignees.iter().map(|a| a.to_lowercase()).collect();
            match filter.operator {
                FilterOperator::Is => ids.iter().any(|id| *id == value),
                FilterOperator::IsNot => !ids.iter().any(|id| *id == value),
                _ => false,
            }
        }
        FilterKind::Tag => {
            let names: Vec<String> = task.tags.iter().map(|t| t.name.to_lowercase()).collect();
            match_strings(&names, filter.operator, &value)
        }
        FilterKind::DueDate => match task.due_date {
            None => filter.operator == FilterOperator::IsNot,
            Some(due) => {
                let due = due.format("%Y-%m-%d").to_string();
                match filter.operator {
                    FilterOperator::Is => due == value,
                    FilterOperator::IsNot => due != value,
                    _ => false,
                }
            }
        },
        // Matches the creator's display name or their email.
        FilterKind::CreatedBy => {
            let creator = [
                task.created_by_name.to_lowercase(),
                task.created_by.to_lowercase(),
            ];
            match_strings(&creator, filter.operator, &value)
        }
    }
}

fn match_strings(items: &[String], operator: FilterOperator, value: &str) -> bool {
    match operator {
        FilterOperator::Is => items.iter().any(|i| i == value),
        FilterOperator::IsNot => !items.iter().any(|i| i == value),
        FilterOperator::Contains => items.iter().any(|i| i.contains(value)),
        FilterOperator::DoesNotContain => !items.iter().any(|i| i.contains(value)),
    }
}

/// Stable sort; ties keep their incoming order.
fn sort_tasks(tasks: &mut [&Task], sort: SortSpec) {
    match sort.key {
        SortKey::Priority => tasks.sort_by(|a, b| {
            let ord = a.priority.rank().cmp(&b.priority.rank());
            directed(ord, sort.dir)
        }),
        // Missing dates sort as +infinity: last ascending, first descending.
        SortKey::DueDate => tasks.sort_by(|a, b| {
            let ord = match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            directed(ord, sort.dir)
        }),
        SortKey::Manual => tasks.sort_by_key(|t| t.position),
    }
}

fn directed(ord: Ordering, dir: SortDir) -> Ordering {
    match dir {
        SortDir::Asc => ord,
        SortDir::Desc => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::{Priority, TagColor, TaskTag};
    use crate::client::state::fixtures::*;
    use chrono::NaiveDate;

    fn filter(kind: FilterKind, operator: FilterOperator, value: &str) -> FilterItem {
        FilterItem {
            kind,
            operator,
            value: value.to_string(),
        }
    }

    fn tagged(id: i64, tags: &[&str]) -> Task {
        let mut t = task(id, 1, &format!("t{}", id), id as i32);
        t.tags = tags
            .iter()
            .enumerate()
            .map(|(i, name)| TaskTag {
                id: i as i64,
                board_id: 1,
                name: name.to_string(),
                color: TagColor::Blue,
            })
            .collect();
        t
    }

    fn due(id: i64, date: Option<(i32, u32, u32)>) -> Task {
        let mut t = task(id, 1, &format!("t{}", id), id as i32);
        t.due_date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        t
    }

    fn ids(tasks: &[&Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_no_filters_keeps_everything_in_position_order() {
        let tasks = vec![task(2, 1, "b", 1), task(1, 1, "a", 0)];
        let visible = visible_tasks(&tasks, &ViewParams::default());
        assert_eq!(ids(&visible), vec![1, 2]);
    }

    #[test]
    fn test_assignee_filter_is_case_insensitive() {
        let mut t = task(1, 1, "a", 0);
        t.assignees = vec!["User-A".into()];
        assert!(matches_filters(&t, &[filter(FilterKind::Assignee, FilterOperator::Is, " user-a ")]));
        assert!(!matches_filters(&t, &[filter(FilterKind::Assignee, FilterOperator::IsNot, "USER-A")]));
        // Substring operators are not supported for assignees.
        assert!(!matches_filters(&t, &[filter(FilterKind::Assignee, FilterOperator::Contains, "user")]));
    }

    #[test]
    fn test_tag_filter_operators() {
        let t = tagged(1, &["Backend", "bug"]);
        let check = |op, v| matches_filters(&t, &[filter(FilterKind::Tag, op, v)]);
        assert!(check(FilterOperator::Is, "backend"));
        assert!(!check(FilterOperator::Is, "back"));
        assert!(check(FilterOperator::Contains, "back"));
        assert!(check(FilterOperator::IsNot, "frontend"));
        assert!(!check(FilterOperator::DoesNotContain, "bu"));
        assert!(check(FilterOperator::DoesNotContain, "ui"));
    }

    #[test]
    fn test_due_date_filter_without_date_matches_only_is_not() {
        let none = due(1, None);
        let some = due(2, Some((2026, 3, 1)));
        let is = [filter(FilterKind::DueDate, FilterOperator::Is, "2026-03-01")];
        let is_not = [filter(FilterKind::DueDate, FilterOperator::IsNot, "2026-03-01")];
        assert!(!matches_filters(&none, &is));
        assert!(matches_filters(&none, &is_not));
        assert!(matches_filters(&some, &is));
        assert!(!matches_filters(&some, &is_not));
        assert!(!matches_filters(
            &some,
            &[filter(FilterKind::DueDate, FilterOperator::Contains, "2026")]
        ));
    }

    #[test]
    fn test_created_by_and_blank_filters() {
        let mut t = task(1, 1, "a", 0);
        t.created_by = "ada@example.com".into();
        assert!(matches_filters(&t, &[filter(FilterKind::CreatedBy, FilterOperator::Contains, "ADA")]));
        assert!(!matches_filters(&t, &[filter(FilterKind::CreatedBy, FilterOperator::Is, "ada")]));
        // Blank values are skipped entirely.
        assert!(matches_filters(&t, &[filter(FilterKind::CreatedBy, FilterOperator::Is, "   ")]));
    }

    #[test]
    fn test_created_by_matches_name_or_email() {
        let mut t = task(1, 1, "a", 0);
        t.created_by = "ada@example.com".into();
        t.created_by_name = "Ada Lovelace".into();
        let check = |op, v| matches_filters(&t, &[filter(FilterKind::CreatedBy, op, v)]);
        assert!(check(FilterOperator::Is, "ada lovelace"));
        assert!(check(FilterOperator::Is, "ADA@example.com"));
        assert!(!check(FilterOperator::IsNot, "Ada Lovelace"));
        assert!(!check(FilterOperator::IsNot, "ada@example.com"));
        assert!(check(FilterOperator::IsNot, "grace"));
        assert!(check(FilterOperator::Contains, "lovelace"));
        assert!(check(FilterOperator::Contains, "example.com"));
        assert!(!check(FilterOperator::DoesNotContain, "love"));
        assert!(check(FilterOperator::DoesNotContain, "hopper"));
    }

    #[test]
    fn test_filters_combine_with_and() {
        let t = tagged(1, &["bug"]);
        let filters = [
            filter(FilterKind::Tag, FilterOperator::Is, "bug"),
            filter(FilterKind::CreatedBy, FilterOperator::Is, "someone-else"),
        ];
        assert!(!matches_filters(&t, &filters));
    }

    #[test]
    fn test_priority_sort_both_directions() {
        let mut low = task(1, 1, "low", 0);
        low.priority = Priority::Low;
        let mut crit = task(2, 1, "crit", 1);
        crit.priority = Priority::Critical;
        let mut med = task(3, 1, "med", 2);
        med.priority = Priority::Medium;
        let tasks = vec![low, crit, med];

        let asc = ViewParams {
            sort: SortSpec { key: SortKey::Priority, dir: SortDir::Asc },
            ..Default::default()
        };
        assert_eq!(ids(&visible_tasks(&tasks, &asc)), vec![1, 3, 2]);
        let desc = ViewParams {
            sort: SortSpec { key: SortKey::Priority, dir: SortDir::Desc },
            ..Default::default()
        };
        assert_eq!(ids(&visible_tasks(&tasks, &desc)), vec![2, 3, 1]);
    }

    #[test]
    fn test_due_date_sort_places_missing_dates() {
        let tasks = vec![due(1, None), due(2, Some((2026, 5, 1))), due(3, Some((2026, 1, 1)))];
        let asc = ViewParams {
            sort: SortSpec { key: SortKey::DueDate, dir: SortDir::Asc },
            ..Default::default()
        };
        assert_eq!(ids(&visible_tasks(&tasks, &asc)), vec![3, 2, 1]);
        let desc = ViewParams {
            sort: SortSpec { key: SortKey::DueDate, dir: SortDir::Desc },
            ..Default::default()
        };
        assert_eq!(ids(&visible_tasks(&tasks, &desc)), vec![1, 2, 3]);
    }

    #[test]
    fn test_project_hides_filtered_tasks_per_column() {
        let mut board = layout(&[(1, "A", &[(1, "T1"), (2, "T2")]), (2, "B", &[(3, "T3")])]);
        board.columns[0].tasks[1].assignees = vec!["u9".into()];
        let params = ViewParams {
            filters: vec![filter(FilterKind::Assignee, FilterOperator::IsNot, "u9")],
            ..Default::default()
        };
        let projection = project(&board, &params);
        assert_eq!(
            projection,
            vec![
                ColumnProjection { column_id: 1, task_ids: vec![1] },
                ColumnProjection { column_id: 2, task_ids: vec![3] },
            ]
        );
    }

    #[test]
    fn test_from_saved_view_defaults_to_manual_sort() {
        let saved = SavedView {
            id: 1,
            board_id: 1,
            name: "all".into(),
            filters: vec![],
            sort: None,
            created_by: "u".into(),
            created_at: String::new(),
        };
        assert_eq!(ViewParams::from_saved(&saved).sort.key, SortKey::Manual);
    }
}
