use crate::models::Department;

/// Departments with their groups deduplicated, sorted, and narrowed to
/// names containing `query` (case-insensitive). Empty departments drop out.
pub fn filter_groups(departments: &[Department], query: &str) -> Vec<Department> {
    let needle = query.to_lowercase();

    departments
        .iter()
        .map(|department| {
            let mut groups: Vec<String> = department
                .groups
                .iter()
                .filter(|group| group.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            groups.sort();
            groups.dedup();
            Department {
                name: department.name.clone(),
                groups,
            }
        })
        .filter(|department| !department.groups.is_empty())
        .collect()
}
